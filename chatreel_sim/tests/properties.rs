//! Property tests for the playback engine under arbitrary control sequences.

use std::sync::Arc;
use std::time::Duration;

use chatreel_core::catalog::ScenarioCatalog;
use chatreel_core::config::PlaybackTimings;
use chatreel_core::engine::{PlaybackEngine, PlaybackEvent, PlaybackState, TimerTicket};
use chatreel_core::model::{Content, Message, Scenario};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    /// Fire the pending timer at its due time
    Fire,
    Start,
    Reset,
    /// Scenario id; 4 does not exist
    Select(u32),
    /// (nth revealed option list, nth option)
    Toggle(usize, usize),
    /// Replay the nth remembered ticket
    FireStale(usize),
    /// Move the clock forward and poll
    Advance(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        8 => Just(Op::Fire),
        2 => Just(Op::Start),
        1 => Just(Op::Reset),
        1 => (1u32..=4).prop_map(Op::Select),
        2 => (0usize..4, 0usize..4).prop_map(|(m, o)| Op::Toggle(m, o)),
        1 => (0usize..8).prop_map(Op::FireStale),
        1 => (0u64..3000).prop_map(Op::Advance),
    ]
}

fn check(engine: &PlaybackEngine) -> Result<(), TestCaseError> {
    let script = engine.selected_scenario().map_or(&[][..], |s| s.script.as_slice());
    let transcript = engine.transcript();

    // Transcript is always a prefix of the selected script
    prop_assert!(transcript.len() <= script.len());
    for (shown, authored) in transcript.iter().zip(script) {
        prop_assert_eq!(shown.id, authored.id);
        prop_assert_eq!(&shown.body, &authored.body);
    }
    prop_assert_eq!(engine.cursor(), transcript.len());

    for msg in transcript {
        if let Some(opts) = msg.options() {
            prop_assert!(opts.iter().filter(|o| o.selected).count() <= 1);
        }
    }

    prop_assert_eq!(engine.is_running(), engine.pending().is_some());
    if engine.state() == PlaybackState::Finished {
        prop_assert_eq!(transcript.len(), script.len());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_invariants_hold_for_any_control_sequence(
        ops in prop::collection::vec(op(), 1..200),
        instant in any::<bool>(),
    ) {
        let timings = if instant { PlaybackTimings::instant() } else { PlaybackTimings::default() };
        let mut engine = PlaybackEngine::new(Arc::new(ScenarioCatalog::builtin()), timings);
        let mut now = Duration::ZERO;
        let mut seen: Vec<TimerTicket> = Vec::new();
        let mut generation = engine.generation();

        for op in ops {
            match op {
                Op::Fire => {
                    if let Some(ticket) = engine.pending() {
                        seen.push(ticket);
                        now = now.max(ticket.due);
                        engine.fire(ticket, now);
                    }
                }
                Op::Start => {
                    engine.start(now);
                }
                Op::Reset => {
                    engine.reset();
                    prop_assert_eq!(engine.state(), PlaybackState::Idle);
                    prop_assert!(engine.transcript().is_empty());
                    prop_assert_eq!(engine.cursor(), 0);
                    prop_assert!(engine.pending().is_none());
                }
                Op::Select(id) => {
                    let known = engine.select_scenario(id);
                    prop_assert_eq!(known, id <= 3);
                }
                Op::Toggle(m, o) => {
                    let target = engine
                        .transcript()
                        .iter()
                        .filter_map(|msg| Some((msg.id, msg.options()?.get(o)?.id.clone())))
                        .nth(m);
                    if let Some((message_id, option_id)) = target {
                        prop_assert!(engine.toggle_option(message_id, &option_id));
                    }
                }
                Op::FireStale(i) => {
                    if let Some(&ticket) = seen.get(i) {
                        if engine.pending() != Some(ticket) {
                            let len = engine.transcript().len();
                            let state = engine.state();
                            prop_assert!(engine.fire(ticket, now).is_empty());
                            prop_assert_eq!(engine.transcript().len(), len);
                            prop_assert_eq!(engine.state(), state);
                        }
                    }
                }
                Op::Advance(ms) => {
                    now += Duration::from_millis(ms);
                    engine.poll(now);
                    if let Some(due) = engine.next_due() {
                        prop_assert!(due > now || timings == PlaybackTimings::instant());
                    }
                }
            }

            check(&engine)?;
            prop_assert!(engine.generation() >= generation);
            generation = engine.generation();
        }
    }

    #[test]
    fn prop_typing_reveals_one_char_at_a_time(
        body in "\\PC{0,40}",
        interval_ms in 1u64..100,
    ) {
        let scenario = Scenario::new(1, "Typing", "One user turn").with_script(vec![Message::user(1, body.clone())]);
        let timings = PlaybackTimings::default().with_typing_interval(Duration::from_millis(interval_ms));
        let mut engine = PlaybackEngine::new(Arc::new(ScenarioCatalog::new(vec![scenario])), timings);
        engine.select_scenario(1);
        engine.start(Duration::ZERO);

        let mut typed = Vec::new();
        let mut type_times = Vec::new();
        while let Some(ticket) = engine.pending() {
            for event in engine.fire(ticket, ticket.due) {
                if let PlaybackEvent::Typed { visible, .. } = event {
                    typed.push(visible);
                    type_times.push(ticket.due);
                }
            }
        }

        let chars: Vec<char> = body.chars().collect();
        prop_assert_eq!(typed.len(), chars.len());
        for (i, visible) in typed.iter().enumerate() {
            let expected: String = chars[..=i].iter().collect();
            prop_assert_eq!(visible, &expected);
        }
        for pair in type_times.windows(2) {
            prop_assert_eq!(pair[1] - pair[0], Duration::from_millis(interval_ms));
        }
        prop_assert_eq!(engine.transcript().len(), 1);
        prop_assert_eq!(&engine.transcript()[0].body, &body);
    }

    #[test]
    fn prop_toggle_keeps_at_most_one_selected(
        toggles in prop::collection::vec(0usize..5, 0..40),
    ) {
        let labels = [("a", "A"), ("b", "B"), ("c", "C"), ("d", "D")];
        let mut msg = Message::system(1, "Pick").with_content(Content::options(labels));
        let mut model: Option<usize> = None;

        for i in toggles {
            let id = labels.get(i).map_or("missing", |(id, _)| *id);
            let applied = msg.toggle_option(id);
            prop_assert_eq!(applied, i < labels.len());
            if applied {
                model = if model == Some(i) { None } else { Some(i) };
            }

            let selected: Vec<usize> = msg
                .options()
                .unwrap_or_default()
                .iter()
                .enumerate()
                .filter(|(_, o)| o.selected)
                .map(|(idx, _)| idx)
                .collect();
            prop_assert_eq!(selected, model.into_iter().collect::<Vec<_>>());
        }
    }
}
