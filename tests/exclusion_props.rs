//! Property-based tests for exclusive device ownership under concurrent
//! open and close calls
//!
//! Run with: cargo test --test exclusion_props

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{eventually, Harness, WAIT};
use crabpreview::testing::OpenBehavior;
use crabpreview::SessionPhase;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// INVARIANT: at most one device handle is live at any time, and every
    /// handle is closed exactly once
    #[test]
    fn at_most_one_device_is_live(
        scripts in prop::collection::vec(prop::collection::vec(any::<bool>(), 1..10), 2..5),
        surface_live in any::<bool>(),
        deferred in any::<bool>(),
    ) {
        let mut h = Harness::new();
        h.config.locking.open_timeout_ms = 5000;
        if surface_live {
            h.target.make_available();
        }
        if deferred {
            h.backend.set_open_behavior(OpenBehavior::Defer);
        }
        let session = Arc::new(h.session());

        // answers deferred opens late, from its own thread, while the
        // workers keep opening and closing
        let done = Arc::new(AtomicBool::new(false));
        let releaser = {
            let backend = h.backend.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    backend.release_pending_open();
                    std::thread::sleep(Duration::from_millis(3));
                }
            })
        };

        let workers: Vec<_> = scripts
            .into_iter()
            .map(|script| {
                let session = session.clone();
                std::thread::spawn(move || {
                    for open in script {
                        if open {
                            let _ = session.request_open();
                        } else {
                            let _ = session.close();
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        session.close().unwrap();
        done.store(true, Ordering::SeqCst);
        releaser.join().unwrap();

        prop_assert_eq!(session.phase(), SessionPhase::Idle);
        prop_assert_eq!(h.backend.pending_opens(), 0);
        prop_assert!(eventually(WAIT, || h.backend.live_devices() == 0));
        prop_assert!(h.backend.max_live_devices() <= 1);

        drop(session);
        prop_assert_eq!(h.backend.leaked_devices(), 0);
    }
}
