//! 分层揭示集成测试：用脚本化片段源驱动两个揭示实例，手动推进时钟

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use pacer::core::Phase;
    use pacer::feed::{demo_script, Fragment, FragmentAssembler, ScriptedFeed};
    use pacer::reveal::{
        ContextDoc, DynamicSubQuestionRecord, HierarchicalStreamReveal, RecordKey, RevealEvent,
    };

    const FRAME: Duration = Duration::from_millis(16);

    struct Harness {
        feed: ScriptedFeed,
        assembler: FragmentAssembler,
        engines: [HierarchicalStreamReveal; 2],
        start: Instant,
        now: Instant,
        previous: HashMap<RecordKey, DynamicSubQuestionRecord>,
        events: Vec<RevealEvent>,
    }

    impl Harness {
        fn new(engines: [HierarchicalStreamReveal; 2]) -> Self {
            Self::with_script(engines, demo_script())
        }

        fn with_script(engines: [HierarchicalStreamReveal; 2], script: Vec<(Duration, Fragment)>) -> Self {
            let start = Instant::now();
            Self {
                feed: ScriptedFeed::new(script),
                assembler: FragmentAssembler::new(),
                engines,
                start,
                now: start,
                previous: HashMap::new(),
                events: Vec::new(),
            }
        }

        /// 推进一帧并检查单调性与兄弟顺序
        fn frame(&mut self) {
            self.now += FRAME;
            for f in self.feed.due(self.now - self.start) {
                self.assembler.apply(f);
            }
            for level in 0..2u32 {
                let records = self.assembler.level(level);
                let report = self.engines[level as usize].tick(&records, self.now);
                self.events.extend(report.events);
                let snapshot = self.engines[level as usize].snapshot();
                assert_eq!(snapshot.len(), records.len());

                for (idx, (dynamic, src)) in snapshot.iter().zip(records.iter()).enumerate() {
                    assert_eq!(dynamic.key(), src.key());
                    assert!(src.question.starts_with(&dynamic.question));
                    assert!(src.answer.starts_with(&dynamic.answer));
                    if idx > 0 && dynamic.phase > Phase::Waiting {
                        assert!(
                            snapshot[idx - 1].phase >= Phase::Answer,
                            "{} left Waiting before its predecessor reached Answer",
                            dynamic.key()
                        );
                    }
                    if let Some(prev) = self.previous.get(&dynamic.key()) {
                        assert!(dynamic.phase >= prev.phase, "phase regressed for {}", dynamic.key());
                        assert!(dynamic.question.starts_with(&prev.question));
                        assert!(dynamic.answer.starts_with(&prev.answer));
                        assert!(dynamic.sub_queries.len() >= prev.sub_queries.len());
                        assert!(dynamic.context_docs.starts_with(&prev.context_docs));
                    }
                    self.previous.insert(dynamic.key(), dynamic.clone());
                }
            }
        }

        fn run_for(&mut self, duration: Duration) {
            let end = self.now + duration;
            while self.now < end {
                self.frame();
            }
        }

        fn converged(&self) -> bool {
            (0..2u32).all(|level| self.engines[level as usize].is_converged(&self.assembler.level(level)))
        }
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_demo_script_reveals_in_order_and_converges() {
        let (allow, on_allow) = counter();
        let (complete, on_complete) = counter();
        let top = HierarchicalStreamReveal::default()
            .with_allow_streaming(on_allow)
            .with_on_complete(on_complete);
        let mut h = Harness::new([top, HierarchicalStreamReveal::default()]);

        h.run_for(Duration::from_secs(60));

        assert!(h.feed.is_exhausted());
        assert!(h.converged());
        for level in 0..2usize {
            assert!(h.engines[level].snapshot().iter().all(|r| r.phase == Phase::Complete));
        }
        assert_eq!(allow.load(Ordering::SeqCst), 1);
        assert_eq!(complete.load(Ordering::SeqCst), 1);

        // 每条记录都经历了完整的阶段序列
        let top_keys = [
            RecordKey { level: 0, level_question_num: 0 },
            RecordKey { level: 0, level_question_num: 1 },
        ];
        for key in top_keys {
            let phases: Vec<Phase> = h
                .events
                .iter()
                .filter_map(|ev| match ev {
                    RevealEvent::PhaseChanged { key: k, to, .. } if *k == key => Some(*to),
                    _ => None,
                })
                .collect();
            assert_eq!(
                phases,
                vec![Phase::SubQueries, Phase::ContextDocs, Phase::Answer, Phase::Complete],
                "unexpected phase sequence for {}",
                key
            );
        }
    }

    #[test]
    fn test_docs_revealed_once_in_arrival_order() {
        let mut h = Harness::new([HierarchicalStreamReveal::default(), HierarchicalStreamReveal::default()]);
        h.run_for(Duration::from_secs(60));

        let first = &h.engines[0].snapshot()[0];
        let ids: Vec<&str> = first.context_docs.iter().map(|d| d.document_id.as_str()).collect();
        assert_eq!(ids, vec!["book-ch04-02", "reference-borrow", "blog-nll"]);
    }

    #[test]
    fn test_fast_forward_after_stall() {
        let mut h = Harness::new([HierarchicalStreamReveal::default(), HierarchicalStreamReveal::default()]);
        h.run_for(Duration::from_millis(1500));

        let records = h.assembler.level(0);
        assert!(!h.engines[0].is_converged(&records));
        let now = h.now;
        h.engines[0].fast_forward(&records, now);

        let snapshot = h.engines[0].snapshot();
        for (dynamic, src) in snapshot.iter().zip(records.iter()) {
            assert!(dynamic.matches_source(src));
        }
    }

    #[test]
    fn test_unmount_freezes_snapshot() {
        let (complete, on_complete) = counter();
        let top = HierarchicalStreamReveal::default().with_on_complete(on_complete);
        let mut h = Harness::new([top, HierarchicalStreamReveal::default()]);
        h.run_for(Duration::from_millis(500));

        h.engines[0].unmount();
        let frozen = h.engines[0].snapshot();
        h.run_for(Duration::from_secs(30));

        assert_eq!(*frozen, *h.engines[0].snapshot());
        assert_eq!(complete.load(Ordering::SeqCst), 0);
    }

    fn key(level_question_num: u32) -> RecordKey {
        RecordKey { level: 0, level_question_num }
    }

    fn at(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn test_content_arriving_with_completion_still_converges() {
        let k = key(0);
        let script = vec![
            (at(0), Fragment::Question { key: k, text: "Which crates?".into() }),
            (at(0), Fragment::SubQuery { key: k, query_id: 0, text: "x".into() }),
            (at(0), Fragment::Docs { key: k, docs: vec![ContextDoc::new("d1", "Doc 1")] }),
            (at(0), Fragment::Answer { key: k, text: "tokio and serde.".into() }),
            // 记录已在 Answer 阶段：新文档、新子查询与完成标记同时到达
            (at(3000), Fragment::Docs { key: k, docs: vec![ContextDoc::new("d2", "Doc 2")] }),
            (
                at(3000),
                Fragment::SubQuery { key: k, query_id: 1, text: "a fairly long second sub query text".into() },
            ),
            (at(3000), Fragment::Complete { key: k }),
        ];
        let mut h = Harness::with_script(
            [HierarchicalStreamReveal::default(), HierarchicalStreamReveal::default()],
            script,
        );
        h.run_for(Duration::from_millis(2990));
        assert_eq!(h.engines[0].snapshot()[0].phase, Phase::Answer);

        h.run_for(Duration::from_secs(30));
        assert!(h.converged());
        let snap = h.engines[0].snapshot();
        assert_eq!(snap[0].context_docs.len(), 2);
        assert_eq!(snap[0].sub_queries[1].query, "a fairly long second sub query text");
    }

    #[test]
    fn test_stopped_successor_keeps_sibling_order() {
        let (first, second) = (key(0), key(1));
        let script = vec![
            (at(0), Fragment::Question { key: first, text: "First question?".into() }),
            (at(0), Fragment::Question { key: second, text: "Second?".into() }),
            (at(0), Fragment::Stop { key: second }),
            (at(200), Fragment::Answer { key: first, text: "Answered.".into() }),
            (at(400), Fragment::Complete { key: first }),
        ];
        // 每帧的兄弟顺序检查由 Harness::frame 完成
        let mut h = Harness::with_script(
            [HierarchicalStreamReveal::default(), HierarchicalStreamReveal::default()],
            script,
        );
        h.frame();
        let snap = h.engines[0].snapshot();
        assert_eq!(snap[0].question, "F");
        assert_eq!(snap[1].question, "");
        assert_eq!(snap[1].phase, Phase::Waiting);

        h.run_for(Duration::from_secs(30));
        assert!(h.converged());
        assert!(h.engines[0].snapshot()[1].is_stopped);
    }
}
