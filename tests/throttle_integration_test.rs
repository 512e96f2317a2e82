//! 阶段节流集成测试：不规则目标跳变下的不跳步与最短停留

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use pacer::core::{Phase, PhaseTable};
    use pacer::throttle::{PhaseQueueThrottler, ThrottleVariant};

    /// 确定性的伪随机序列（线性同余）
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self, bound: u64) -> u64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 33) % bound
        }
    }

    /// 随机推进目标阶段、随机帧间隔，返回每次出队的 (阶段, 时刻)
    fn drive(variant: ThrottleVariant, min_delay: Duration, seed: u64) -> Vec<(Phase, Instant)> {
        let table = variant.table();
        let phases = PhaseTable::FULL.phases();
        let start = Instant::now();
        let mut t = PhaseQueueThrottler::new(variant, min_delay, start);
        let mut rng = Lcg(seed);
        let mut now = start;
        let mut target = 0usize;
        let mut shown = vec![(t.displayed_phase(), start)];

        for _ in 0..2000 {
            now += Duration::from_millis(1 + rng.next(40));
            if rng.next(10) == 0 {
                // 目标可能回退，节流器应忽略
                target = target.saturating_sub(1);
            } else if rng.next(6) == 0 {
                target = (target + 1 + rng.next(3) as usize).min(phases.len() - 1);
            }
            t.advance(table.project(phases[target]));
            if let Some(p) = t.tick(now) {
                shown.push((p, now));
            }
            // 同一时刻再 tick 一次不应再出队
            assert_eq!(t.tick(now), None);
        }
        shown
    }

    fn assert_paced(variant: ThrottleVariant, min_delay: Duration, shown: &[(Phase, Instant)]) {
        let table = variant.table();
        assert_eq!(shown[0].0, table.first());
        for pair in shown.windows(2) {
            let ((prev, at_prev), (next, at_next)) = (pair[0], pair[1]);
            assert_eq!(table.next(prev), Some(next), "skipped from {:?} to {:?}", prev, next);
            assert!(at_next.duration_since(at_prev) >= min_delay);
        }
    }

    #[test]
    fn test_list_variant_never_skips_under_jumps() {
        for seed in [1, 7, 42, 1234] {
            let shown = drive(ThrottleVariant::List, Duration::from_millis(300), seed);
            assert_paced(ThrottleVariant::List, Duration::from_millis(300), &shown);
        }
    }

    #[test]
    fn test_label_variant_never_skips_under_jumps() {
        for seed in [3, 99, 2024] {
            let shown = drive(ThrottleVariant::Label, Duration::from_millis(1000), seed);
            assert_paced(ThrottleVariant::Label, Duration::from_millis(1000), &shown);
            assert!(shown.iter().all(|(p, _)| PhaseTable::BADGE.position(*p).is_some()));
        }
    }
}
