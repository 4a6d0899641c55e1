//! Integration tests exercising the queue hand-off around a processing chain.
//!
//! The host side plays microphone buffers through a [`PlayWriter`] and reads
//! the processed output back through a [`RecordReader`], standing in for the
//! codec driver:
//!
//! ```text
//! PlayWriter → PlayQueue → FeedbackCancel → CompWdrc → Amplifier → RecordQueue → RecordReader
//!                               ↑______________ loopback ____________|
//! ```
//!
//! [`PlayWriter`]: crate::io::PlayWriter
//! [`RecordReader`]: crate::io::RecordReader

#[cfg(all(test, feature = "dsp"))]
mod tests {
    use alloc::vec::Vec;

    use crate::block::BlockPool;
    use crate::dsp::nlms::AfcParams;
    use crate::dsp::wdrc::WdrcParams;
    use crate::graph::{Graph, NodeId};
    use crate::io::{AudioPlayQueue, AudioRecordQueue, BlockBuffer, PlayWriter, RecordReader};
    use crate::nodes::{AudioAmplifier, AudioEffectCompWdrc, AudioEffectFeedbackCancel};
    use crate::settings::AudioSettings;

    const BLOCK: usize = 32;

    struct Chain {
        afc: NodeId,
        wdrc: NodeId,
        writer: PlayWriter,
        reader: RecordReader,
    }

    fn build(g: &mut Graph<'_>, afc_params: AfcParams, wdrc_params: WdrcParams) -> Chain {
        let play = AudioPlayQueue::new();
        let writer = play.writer();
        let mut rec = AudioRecordQueue::new();
        rec.start();
        let reader = rec.reader();

        let mic = g.add_node(play);
        let afc = g.add_node(AudioEffectFeedbackCancel::new(afc_params));
        let wdrc = g.add_node(AudioEffectCompWdrc::new(wdrc_params));
        let amp = g.add_node(AudioAmplifier::new());
        let out = g.add_node(rec);
        g.connect(mic, 0, afc, 0).unwrap();
        g.connect(afc, 0, wdrc, 0).unwrap();
        g.connect(wdrc, 0, amp, 0).unwrap();
        g.connect(amp, 0, out, 0).unwrap();
        g.add_loopback(amp, 0, afc).unwrap();
        Chain {
            afc,
            wdrc,
            writer,
            reader,
        }
    }

    fn linear(gain_db: f32) -> WdrcParams {
        WdrcParams {
            tk_gain_db: gain_db,
            tk_db: 0.0,
            cr: 1.0,
            bolt_db: 200.0,
            ..WdrcParams::default()
        }
    }

    // ---------------------------------------------------------------
    // Data integrity: ramp in, ramp out
    // ---------------------------------------------------------------
    #[test]
    fn passthrough_round_trip() {
        let pool = BlockPool::new(16, AudioSettings::new(24_000.0, BLOCK)).unwrap();
        let mut g = Graph::new(&pool);
        let afc_off = AfcParams {
            enabled: false,
            ..AfcParams::default()
        };
        let chain = build(&mut g, afc_off, linear(0.0));

        let ramp: Vec<f32> = (0..BLOCK).map(|i| i as f32 / BLOCK as f32 - 0.5).collect();
        for _ in 0..4 {
            chain.writer.play(BlockBuffer::from_samples(&ramp, 0)).unwrap();
        }
        for _ in 0..4 {
            g.update_all();
        }

        let mut ids = Vec::new();
        while let Some(buf) = chain.reader.read() {
            for (o, i) in buf.samples().iter().zip(&ramp) {
                assert!((o - i).abs() < 1e-5, "sample {} came back as {}", i, o);
            }
            ids.push(buf.id());
        }
        assert_eq!(ids, [1, 2, 3, 4]);
        assert_eq!(pool.in_use(), 0, "no block may outlive its tick");
    }

    // ---------------------------------------------------------------
    // Streaming stability: many ticks, no leaks, loopback in step
    // ---------------------------------------------------------------
    #[test]
    fn sustained_closed_loop_stays_in_step() {
        let pool = BlockPool::new(16, AudioSettings::new(24_000.0, BLOCK)).unwrap();
        let mut g = Graph::new(&pool);
        let chain = build(&mut g, AfcParams::default(), WdrcParams::default());

        let mut seed = 1u32;
        let mut previous_out = [0.0f32; BLOCK];
        for _ in 0..300 {
            // microphone = noise + a little of what was played last block
            let mut mic = [0.0f32; BLOCK];
            for (m, &o) in mic.iter_mut().zip(&previous_out) {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                let noise = (seed >> 8) as f32 / (1u32 << 24) as f32 - 0.5;
                *m = 0.05 * noise + 0.2 * o;
            }
            chain.writer.play(BlockBuffer::from_samples(&mic, 0)).unwrap();
            g.update_all();
            if let Some(out) = chain.reader.read() {
                previous_out.copy_from_slice(out.samples());
            }
            assert!(pool.in_use() == 0);
        }

        let afc = g.node::<AudioEffectFeedbackCancel>(chain.afc).unwrap();
        assert_eq!(afc.canceller().falling_behind_count(), 0);
        assert_eq!(afc.canceller().last_loopback_id(), Some(300));
        assert!(afc.canceller().coefficients().iter().all(|c| c.is_finite()));
        let wdrc = g.node::<AudioEffectCompWdrc>(chain.wdrc).unwrap();
        assert!(wdrc.current_gain().is_finite());
        assert_eq!(chain.reader.overflow_count(), 0);
        assert!(pool.max_in_use() <= 2, "chain should run in place, peak {}", pool.max_in_use());
    }

    // ---------------------------------------------------------------
    // Reconfiguration: unplugging the recorder keeps the loopback alive
    // ---------------------------------------------------------------
    #[test]
    fn disconnecting_recorder_mid_stream() {
        let pool = BlockPool::new(16, AudioSettings::new(24_000.0, BLOCK)).unwrap();
        let mut g = Graph::new(&pool);
        let chain = build(&mut g, AfcParams::default(), linear(0.0));
        let amp = NodeId(3);
        let out = NodeId(4);

        for _ in 0..2 {
            chain.writer.play(BlockBuffer::from_samples(&[0.1; BLOCK], 0)).unwrap();
            g.update_all();
        }
        g.disconnect(amp, 0, out, 0).unwrap();
        assert!(g.is_active(amp), "loopback route keeps the amplifier running");
        assert!(!g.is_active(out));
        for _ in 0..2 {
            chain.writer.play(BlockBuffer::from_samples(&[0.1; BLOCK], 0)).unwrap();
            g.update_all();
        }

        assert_eq!(chain.reader.available(), 2);
        let afc = g.node::<AudioEffectFeedbackCancel>(chain.afc).unwrap();
        assert_eq!(afc.canceller().last_loopback_id(), Some(4));
        assert_eq!(pool.in_use(), 0);
    }
}
