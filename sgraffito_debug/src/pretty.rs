// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per
//! event to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use sgraffito_core::item::ItemDamage;
use sgraffito_core::trace::{
    CacheRemapEvent, PickEvent, RemapKind, RenderBeginEvent, RenderSummary, TraceSink,
    UpdateSummary,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write)
/// destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink, returning the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}

fn remap_name(kind: RemapKind) -> &'static str {
    match kind {
        RemapKind::Noop => "noop",
        RemapKind::Translation => "translate",
        RemapKind::Repaint => "repaint",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_update_begin(&mut self) {
        let _ = writeln!(self.writer, "[update] begin");
    }

    fn on_update_end(&mut self, s: &UpdateSummary) {
        let _ = writeln!(
            self.writer,
            "[update] end transforms={} bboxes={} styles={} content={} +{}/-{} topology={}",
            s.transforms, s.bboxes, s.styles, s.content, s.added, s.removed, s.topology_changed,
        );
    }

    fn on_render_begin(&mut self, e: &RenderBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[render] begin root={} area=({},{})-({},{})",
            e.root, e.area.x0, e.area.y0, e.area.x1, e.area.y1,
        );
    }

    fn on_render_end(&mut self, s: &RenderSummary) {
        let _ = writeln!(
            self.writer,
            "[render] end painted={} hits={} misses={}",
            s.painted, s.cache_hits, s.cache_misses,
        );
    }

    fn on_cache_remap(&mut self, e: &CacheRemapEvent) {
        let _ = writeln!(
            self.writer,
            "[cache] item={} remap={}",
            e.item,
            remap_name(e.kind)
        );
    }

    fn on_pick(&mut self, e: &PickEvent) {
        match e.hit {
            Some(hit) => {
                let _ = writeln!(
                    self.writer,
                    "[pick] ({:.2},{:.2}) delta={:.2} hit={hit}",
                    e.point.x, e.point.y, e.delta,
                );
            }
            None => {
                let _ = writeln!(
                    self.writer,
                    "[pick] ({:.2},{:.2}) delta={:.2} miss",
                    e.point.x, e.point.y, e.delta,
                );
            }
        }
    }

    fn on_damage_rects(&mut self, rects: &[ItemDamage]) {
        for d in rects {
            let _ = writeln!(
                self.writer,
                "[damage] item={} area=({},{})-({},{})",
                d.idx, d.area.x0, d.area.y0, d.area.x1, d.area.y1,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Point;
    use sgraffito_core::geom::IntRect;
    use sgraffito_core::trace::Tracer;

    use super::*;

    #[test]
    fn lines_are_emitted_per_event() {
        let mut sink = PrettyPrintSink::with_writer(Vec::new());
        {
            let mut tracer = Tracer::new(&mut sink);
            tracer.update_begin();
            tracer.update_end(&UpdateSummary::default());
            tracer.render_begin(&RenderBeginEvent {
                root: 0,
                area: IntRect::new(0, 0, 10, 10).unwrap(),
            });
            tracer.render_end(&RenderSummary::default());
            tracer.cache_remap(3, RemapKind::Translation);
            tracer.pick(Point::new(1.0, 2.0), 0.5, Some(7));
            tracer.pick(Point::new(3.0, 4.0), 0.0, None);
        }
        let text = String::from_utf8(sink.into_writer()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 7);
        assert!(lines[0].starts_with("[update] begin"));
        assert!(lines[4].contains("remap=translate"));
        assert!(lines[5].contains("hit=7"));
        assert!(lines[6].contains("miss"));
    }
}
