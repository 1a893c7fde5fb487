use std::{
    fmt::Display,
    panic::{self, AssertUnwindSafe},
    sync::mpsc,
    thread,
};

/// A job that panicked instead of returning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPanic {
    pub index: usize,
    pub message: String,
}

impl Display for JobPanic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job {} panicked: {}", self.index, self.message)
    }
}

impl std::error::Error for JobPanic {}

type Completion<R> = (usize, usize, thread::Result<R>);

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn into_result<R>(index: usize, result: thread::Result<R>) -> Result<R, JobPanic> {
    result.map_err(|payload| JobPanic {
        index,
        message: panic_message(payload.as_ref()),
    })
}

/// Runs `f(slot, index, item)` for every item with at most `size` items in
/// flight at any time. `slot` is in `0..size` and no two running jobs share
/// a slot.
///
/// Submission blocks while all slots are busy, until a job reports its
/// completion over a bounded channel. Results are returned in item order.
/// A panicking job frees its slot and yields a [`JobPanic`].
pub fn run_in_slots<T, R, F>(size: usize, items: Vec<T>, f: F) -> Vec<Result<R, JobPanic>>
where
    T: Send,
    R: Send,
    F: Fn(usize, usize, T) -> R + Sync,
{
    let size = size.max(1);
    let mut results: Vec<Option<Result<R, JobPanic>>> = (0..items.len()).map(|_| None).collect();
    let mut free_slots: Vec<usize> = (0..size).rev().collect();
    let (sender, receiver) = mpsc::sync_channel::<Completion<R>>(size);

    thread::scope(|s| {
        let f = &f;

        for (index, item) in items.into_iter().enumerate() {
            let slot = match free_slots.pop() {
                Some(slot) => slot,
                None => match receiver.recv() {
                    Ok((slot, done, result)) => {
                        tracing::debug!(slot, job = done, "slot freed");
                        results[done] = Some(into_result(done, result));
                        slot
                    }
                    Err(_) => break,
                },
            };

            let sender = sender.clone();
            s.spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| f(slot, index, item)));
                let _ = sender.send((slot, index, result));
            });
        }

        drop(sender);

        for (slot, done, result) in receiver.iter() {
            tracing::debug!(slot, job = done, "slot freed");
            results[done] = Some(into_result(done, result));
        }
    });

    results.into_iter().flatten().collect()
}

#[test]
fn test_run_in_slots_bounded() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let running = AtomicUsize::new(0);
    let max_running = AtomicUsize::new(0);
    let slots_in_use = std::sync::Mutex::new(vec![false; 3]);

    let results = run_in_slots(3, (0..20).collect(), |slot, index, item: usize| {
        {
            let mut slots = slots_in_use.lock().unwrap();
            assert!(!slots[slot], "slot {} used twice", slot);
            slots[slot] = true;
        }
        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
        max_running.fetch_max(now, Ordering::SeqCst);

        thread::sleep(std::time::Duration::from_millis(5));

        running.fetch_sub(1, Ordering::SeqCst);
        slots_in_use.lock().unwrap()[slot] = false;
        assert_eq!(index, item);
        item * 2
    });

    assert!(max_running.load(Ordering::SeqCst) <= 3);
    assert_eq!(
        results.into_iter().map(Result::unwrap).collect::<Vec<_>>(),
        (0..20).map(|i| i * 2).collect::<Vec<_>>()
    );
}

#[test]
fn test_run_in_slots_panic() {
    let results = run_in_slots(2, vec![1, 0, 3], |_, _, item: u32| {
        if item == 0 {
            panic!("zero");
        }
        10 / item
    });

    assert_eq!(results[0], Ok(10));
    assert_eq!(
        results[1],
        Err(JobPanic {
            index: 1,
            message: "zero".to_string()
        })
    );
    assert_eq!(results[2], Ok(3));
}
