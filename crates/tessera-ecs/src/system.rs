use crate::event::ConsumerId;
use crate::world::World;

/// A system that operates on the world each frame.
///
/// The [`ConsumerId`] is the system's identity when receiving events, so each
/// system sees each event once no matter how often it polls.
pub trait System: Send + Sync {
    fn run(&mut self, world: &mut World, consumer: ConsumerId);
}

/// Blanket implementation so closures can be used as systems.
impl<F: FnMut(&mut World, ConsumerId) + Send + Sync> System for F {
    fn run(&mut self, world: &mut World, consumer: ConsumerId) {
        (self)(world, consumer);
    }
}

/// An ordered list of systems to run each frame.
pub struct SystemSchedule {
    systems: Vec<(ConsumerId, Box<dyn System>)>,
    next_consumer: u32,
}

impl SystemSchedule {
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
            next_consumer: 1,
        }
    }

    /// Add a system to the end of the schedule and return its consumer identity.
    pub fn add_system<S: System + 'static>(&mut self, system: S) -> ConsumerId {
        let consumer = ConsumerId(self.next_consumer);
        self.next_consumer += 1;
        self.systems.push((consumer, Box::new(system)));
        consumer
    }

    /// Run all systems in order on the given world.
    pub fn run_all(&mut self, world: &mut World) {
        for (consumer, system) in &mut self.systems {
            system.run(world, *consumer);
        }
    }

    /// Run all systems, then advance event lifetimes. Returns the number of
    /// events that expired.
    pub fn run_frame(&mut self, world: &mut World) -> usize {
        self.run_all(world);
        world.tick()
    }

    /// Number of systems in the schedule.
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

impl Default for SystemSchedule {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct Ping(u32);

    #[test]
    fn closure_system() {
        let mut world = World::new();
        world.insert_resource(0u32);

        let mut system = |w: &mut World, _: ConsumerId| {
            let count = w.resource_mut::<u32>().unwrap();
            *count += 1;
        };
        system.run(&mut world, ConsumerId(1));
        assert_eq!(*world.resource::<u32>().unwrap(), 1);
    }

    #[test]
    fn schedule_ordering() {
        let mut world = World::new();
        let log = Arc::new(Mutex::new(Vec::<u32>::new()));

        let mut schedule = SystemSchedule::new();
        let log1 = log.clone();
        schedule.add_system(move |_: &mut World, _: ConsumerId| log1.lock().unwrap().push(1));
        let log2 = log.clone();
        schedule.add_system(move |_: &mut World, _: ConsumerId| log2.lock().unwrap().push(2));
        let log3 = log.clone();
        schedule.add_system(move |_: &mut World, _: ConsumerId| log3.lock().unwrap().push(3));

        schedule.run_all(&mut world);
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn systems_get_distinct_consumers() {
        let mut schedule = SystemSchedule::new();
        let a = schedule.add_system(|_: &mut World, _: ConsumerId| {});
        let b = schedule.add_system(|_: &mut World, _: ConsumerId| {});
        assert_ne!(a, b);
        assert_eq!(schedule.len(), 2);
    }

    #[test]
    fn each_system_receives_each_event_once() {
        let mut world = World::new();
        let seen = Arc::new(Mutex::new(Vec::<(ConsumerId, u32)>::new()));

        let mut schedule = SystemSchedule::new();
        schedule.add_system(|w: &mut World, _: ConsumerId| {
            if !w.has_resource::<bool>() {
                w.insert_resource(true);
                w.send::<Ping>().0 = 10;
            }
        });
        for _ in 0..2 {
            let seen = seen.clone();
            schedule.add_system(move |w: &mut World, me: ConsumerId| {
                w.receive::<Ping>(me, |p| seen.lock().unwrap().push((me, p.0)));
            });
        }

        assert_eq!(schedule.run_frame(&mut world), 0);
        assert_eq!(schedule.run_frame(&mut world), 1);
        schedule.run_frame(&mut world);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_ne!(seen[0].0, seen[1].0);
        assert!(seen.iter().all(|(_, v)| *v == 10));
    }
}
