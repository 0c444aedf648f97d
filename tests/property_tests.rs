//! Property-based tests for binix-nav
//!
//! Random sequences of user navigations and renderer replies must keep a
//! tab's surfaces consistent.

use std::sync::{Arc, Mutex};

use binix_nav::navigation::{CommitParams, Decision, InterstitialDelegate, SurfaceEvent, Transition};
use binix_nav::process::ProcessManager;
use binix_nav::tab::{Tab, TabId};
use binix_nav::NavigationConfig;
use proptest::prelude::*;
use url::Url;

const SITES: &[&str] = &[
    "http://www.google.com",
    "http://www.yahoo.com",
    "http://www.bing.com",
    "chrome://newtab",
];

#[derive(Debug, Clone)]
enum Op {
    Load(usize),
    UnloadAck(bool),
    Response,
    SwapOutAck,
    CommitPending,
    CommitCurrent,
    CrashCurrent,
    CrashPending,
    Back,
    Stop,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..SITES.len()).prop_map(Op::Load),
        2 => any::<bool>().prop_map(Op::UnloadAck),
        2 => Just(Op::Response),
        2 => Just(Op::SwapOutAck),
        3 => Just(Op::CommitPending),
        1 => Just(Op::CommitCurrent),
        1 => Just(Op::CrashCurrent),
        1 => Just(Op::CrashPending),
        1 => Just(Op::Back),
        1 => Just(Op::Stop),
    ]
}

fn setup() -> (Tab, ProcessManager) {
    let mut processes = ProcessManager::new();
    let partition = processes.create_site_instance();
    let tab = Tab::new(
        TabId::new(1),
        Arc::new(NavigationConfig::default()),
        partition,
        &mut processes,
    )
    .unwrap();
    (tab, processes)
}

/// Apply `op`. Returns whether the current surface may change because of it.
fn apply(tab: &mut Tab, p: &mut ProcessManager, op: &Op, page_id: &mut i32) -> bool {
    *page_id += 1;
    match op {
        Op::Load(site) => {
            let _ = tab.load_url(SITES[*site], Transition::Typed, p);
            true
        }
        Op::UnloadAck(proceed) => {
            tab.should_close_ack(true, *proceed, p);
            false
        }
        Op::Response => {
            tab.cross_site_response(*page_id as u64, p);
            false
        }
        Op::SwapOutAck => {
            let current = tab.current_surface();
            tab.swap_out_ack(current, p);
            false
        }
        Op::CommitPending => {
            let pending = tab
                .manager()
                .tracker()
                .pending()
                .map(|nav| (nav.surface, nav.destination.clone()));
            if let Some((surface, url)) = pending {
                tab.did_navigate(surface, CommitParams::main_frame(url, *page_id), p);
            }
            true
        }
        Op::CommitCurrent => {
            let current = tab.current_surface();
            let url = tab
                .controller()
                .last_committed_entry()
                .map(|e| e.url().clone())
                .unwrap_or_else(|| Url::parse(SITES[0]).unwrap());
            tab.did_navigate(current, CommitParams::main_frame(url, *page_id), p);
            false
        }
        Op::CrashCurrent => {
            let current = tab.current_surface();
            tab.render_view_gone(current, p);
            false
        }
        Op::CrashPending => {
            if let Some(pending) = tab.pending_surface() {
                tab.render_view_gone(pending, p);
            }
            false
        }
        Op::Back => {
            let _ = tab.go_back(p);
            true
        }
        Op::Stop => {
            tab.stop(p);
            false
        }
    }
}

proptest! {
    #[test]
    fn test_random_sequences_keep_surfaces_consistent(ops in prop::collection::vec(op(), 1..40)) {
        let (mut tab, mut p) = setup();
        let mut page_id = 0;

        for op in &ops {
            let before = tab.current_surface();
            let may_swap = apply(&mut tab, &mut p, op, &mut page_id);
            let current = tab.current_surface();

            // Exactly one current surface, and it is never parked
            prop_assert!(tab.manager().surface(current).is_some());
            prop_assert_ne!(tab.manager().swapped_out_surface(tab.partition()), Some(current));
            // At most one pending surface, distinct from the current one
            prop_assert_eq!(
                tab.pending_surface().is_some(),
                tab.manager().cross_navigation_pending()
            );
            if let Some(pending) = tab.pending_surface() {
                prop_assert_ne!(pending, current);
                prop_assert!(tab.manager().surface(pending).is_some());
            }
            if !may_swap {
                prop_assert_eq!(before, current, "{:?} changed the current surface", op);
            }
        }
    }

    #[test]
    fn test_same_site_navigation_never_swaps(
        host in prop::sample::select(vec!["www", "mail", "news", "maps"]),
        path in "[a-z0-9]{0,12}",
    ) {
        let (mut tab, mut p) = setup();
        let google = tab.load_url("http://www.google.com", Transition::Typed, &mut p).unwrap();
        let home = Url::parse("http://www.google.com").unwrap();
        tab.did_navigate(google, CommitParams::main_frame(home, 1), &mut p);

        let dest = format!("http://{}.google.com/{}", host, path);
        let surface = tab.load_url(&dest, Transition::Link, &mut p).unwrap();
        prop_assert_eq!(surface, google);
        prop_assert!(!tab.manager().cross_navigation_pending());
    }

    #[test]
    fn test_commands_after_proceed_never_delivered(
        before in 0usize..5,
        after in 0usize..5,
        new_navigation in any::<bool>(),
    ) {
        let (mut tab, mut p) = setup();
        let google = tab.load_url("http://www.google.com", Transition::Typed, &mut p).unwrap();
        let home = Url::parse("http://www.google.com").unwrap();
        tab.did_navigate(google, CommitParams::main_frame(home, 1), &mut p);

        let count = Arc::new(Mutex::new(0usize));
        tab.show_interstitial(
            "http://www.google.com/warning",
            new_navigation,
            Box::new(Counter { count: Arc::clone(&count) }),
            &mut p,
        )
        .unwrap();

        for _ in 0..before {
            prop_assert!(tab.interstitial_command("cmd"));
        }
        prop_assert!(tab.interstitial_proceed(&mut p));
        for _ in 0..after {
            prop_assert!(!tab.interstitial_command("cmd"));
        }
        prop_assert_eq!(*count.lock().unwrap(), before);
    }

    #[test]
    fn test_replaced_overlay_detaches_before_new_one_attaches(
        first_new in any::<bool>(),
        second_new in any::<bool>(),
        first_committed in any::<bool>(),
    ) {
        let (mut tab, mut p) = setup();
        let google = tab.load_url("http://www.google.com", Transition::Typed, &mut p).unwrap();
        let home = Url::parse("http://www.google.com").unwrap();
        tab.did_navigate(google, CommitParams::main_frame(home, 1), &mut p);
        let events = tab.subscribe();
        let data = || CommitParams::main_frame(Url::parse("data:text/html,warning").unwrap(), 1);

        let first = tab
            .show_interstitial("http://www.google.com/a", first_new, Box::new(Silent), &mut p)
            .unwrap();
        if first_committed {
            let surface = tab.interstitial().active().unwrap().surface().unwrap();
            tab.did_navigate(surface, data(), &mut p);
        }
        let second = tab
            .show_interstitial("http://www.google.com/b", second_new, Box::new(Silent), &mut p)
            .unwrap();
        let surface = tab.interstitial().active().unwrap().surface().unwrap();
        tab.did_navigate(surface, data(), &mut p);

        let events: Vec<_> = events.try_iter().collect();
        let detached = events.iter().position(|e| {
            *e == SurfaceEvent::InterstitialDetached {
                overlay: first,
                decision: Decision::DontProceed,
            }
        });
        let attached = events.iter().position(|e| {
            matches!(e, SurfaceEvent::InterstitialAttached { overlay, .. } if *overlay == second)
        });
        prop_assert!(detached.is_some());
        prop_assert!(attached.is_some());
        prop_assert!(detached < attached);
    }
}

struct Counter {
    count: Arc<Mutex<usize>>,
}

impl InterstitialDelegate for Counter {
    fn html_contents(&self) -> String {
        "<p>warning</p>".to_string()
    }

    fn command_received(&mut self, _command: &str) {
        *self.count.lock().unwrap() += 1;
    }
}

struct Silent;

impl InterstitialDelegate for Silent {
    fn html_contents(&self) -> String {
        String::new()
    }
}
