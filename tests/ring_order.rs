use spindle::{Error, Runtime, Scheduler};
use std::cell::RefCell;
use std::rc::Rc;

type Log<T> = Rc<RefCell<Vec<T>>>;

#[test]
fn test_round_robin_reverse_insertion_order() {
    let mut rt = Runtime::new();
    let log: Log<usize> = Rc::default();

    for id in 0..4 {
        let log = log.clone();
        rt.spawn(move |scheduler| {
            for _ in 0..3 {
                log.borrow_mut().push(id);
                scheduler.yield_now()?;
            }
            Ok(())
        })
        .expect("spawn");
    }

    rt.run().expect("run");

    assert_eq!(
        *log.borrow(),
        vec![3, 2, 1, 0, 3, 2, 1, 0, 3, 2, 1, 0],
        "every task should be visited once per round, newest first"
    );
}

#[test]
fn test_most_recent_spawn_runs_first() {
    let mut rt = Runtime::new();
    let log: Log<&'static str> = Rc::default();

    for name in ["first", "second", "third"] {
        let log = log.clone();
        rt.spawn(move |_| {
            log.borrow_mut().push(name);
            Ok(())
        })
        .expect("spawn");
    }

    rt.run().expect("run");

    assert_eq!(*log.borrow(), vec!["third", "second", "first"]);
}

#[test]
fn test_lone_task_yield_is_noop() {
    let mut rt = Runtime::new();
    let yields = Rc::new(RefCell::new(0));
    let counter = yields.clone();

    rt.spawn(move |scheduler| {
        for _ in 0..5 {
            scheduler.yield_now()?;
            *counter.borrow_mut() += 1;
        }
        Ok(())
    })
    .expect("spawn");

    rt.run().expect("run");

    assert_eq!(*yields.borrow(), 5);
}

fn stepper(scheduler: &Scheduler, log: Log<String>, id: u32, depth: u32) -> Result<(), Error> {
    log.borrow_mut().push(format!("step one {id}"));
    if id < depth {
        let child_log = log.clone();
        scheduler.spawn(move |scheduler| spawner(scheduler, child_log, id + 1, depth))?;
    }
    scheduler.yield_now()?;
    log.borrow_mut().push(format!("step two {id}"));
    scheduler.yield_now()?;
    log.borrow_mut().push(format!("step three {id}"));
    scheduler.yield_now()?;
    scheduler.end_task();
    log.borrow_mut().push(format!("finish stepper {id}"));
    Ok(())
}

fn spawner(scheduler: &Scheduler, log: Log<String>, id: u32, depth: u32) -> Result<(), Error> {
    log.borrow_mut().push(format!("make spawner {id}"));
    scheduler.yield_now()?;
    if id < depth {
        let child_log = log.clone();
        scheduler.spawn(move |scheduler| stepper(scheduler, child_log, id + 1, depth))?;
        scheduler.yield_now()?;
    }
    scheduler.end_task();
    log.borrow_mut().push(format!("finish spawner {id}"));
    Ok(())
}

fn run_chain(depth: u32) -> Vec<String> {
    let mut rt = Runtime::new();
    let log: Log<String> = Rc::default();
    let root_log = log.clone();

    rt.spawn(move |scheduler| stepper(scheduler, root_log, 0, depth))
        .expect("spawn");
    rt.run().expect("run");

    let stats = rt.stats();
    assert_eq!(stats.active, 0);
    assert_eq!(stats.pending_reclaim, 0);
    assert_eq!(stats.spawned, u64::from(depth) + 1);
    assert_eq!(stats.reclaimed, stats.spawned);

    log.take()
}

#[test]
fn test_schedule_is_deterministic() {
    let first = run_chain(12);
    let second = run_chain(12);

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_chain_reaches_every_depth() {
    let log = run_chain(6);

    for id in (0..=6).step_by(2) {
        assert!(log.contains(&format!("finish stepper {id}")), "stepper {id} missing");
    }
    for id in (1..=6).step_by(2) {
        assert!(log.contains(&format!("finish spawner {id}")), "spawner {id} missing");
    }
}
