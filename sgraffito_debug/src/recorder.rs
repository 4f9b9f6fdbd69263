// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them
//! back as an iterator of [`RecordedEvent`].
//!
//! The rich damage event stores only the rect count; full rects belong in
//! the pretty printer, not a compact recording.

use sgraffito_core::item::ItemDamage;
use sgraffito_core::trace::{
    CacheRemapEvent, PickEvent, RemapKind, RenderBeginEvent, RenderSummary, TraceSink,
    UpdateSummary,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_UPDATE_BEGIN: u8 = 1;
const TAG_UPDATE_END: u8 = 2;
const TAG_RENDER_BEGIN: u8 = 3;
const TAG_RENDER_END: u8 = 4;
const TAG_CACHE_REMAP: u8 = 5;
const TAG_PICK: u8 = 6;
const TAG_DAMAGE_COUNT: u8 = 7;

const NO_HIT: u32 = u32::MAX;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
}

impl TraceSink for RecorderSink {
    fn on_update_begin(&mut self) {
        self.buf.push(TAG_UPDATE_BEGIN);
    }

    fn on_update_end(&mut self, s: &UpdateSummary) {
        self.buf.push(TAG_UPDATE_END);
        self.put_u32(s.transforms);
        self.put_u32(s.bboxes);
        self.put_u32(s.styles);
        self.put_u32(s.content);
        self.put_u32(s.added);
        self.put_u32(s.removed);
        self.buf.push(u8::from(s.topology_changed));
    }

    fn on_render_begin(&mut self, e: &RenderBeginEvent) {
        self.buf.push(TAG_RENDER_BEGIN);
        self.put_u32(e.root);
        self.put_i32(e.area.x0);
        self.put_i32(e.area.y0);
        self.put_i32(e.area.x1);
        self.put_i32(e.area.y1);
    }

    fn on_render_end(&mut self, s: &RenderSummary) {
        self.buf.push(TAG_RENDER_END);
        self.put_u32(s.painted);
        self.put_u32(s.cache_hits);
        self.put_u32(s.cache_misses);
    }

    fn on_cache_remap(&mut self, e: &CacheRemapEvent) {
        self.buf.push(TAG_CACHE_REMAP);
        self.put_u32(e.item);
        self.buf.push(match e.kind {
            RemapKind::Noop => 0,
            RemapKind::Translation => 1,
            RemapKind::Repaint => 2,
        });
    }

    fn on_pick(&mut self, e: &PickEvent) {
        self.buf.push(TAG_PICK);
        self.put_f64(e.point.x);
        self.put_f64(e.point.y);
        self.put_f64(e.delta);
        self.put_u32(e.hit.unwrap_or(NO_HIT));
    }

    fn on_damage_rects(&mut self, rects: &[ItemDamage]) {
        self.buf.push(TAG_DAMAGE_COUNT);
        self.put_u32(u32::try_from(rects.len()).unwrap_or(u32::MAX));
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// A decoded event from a [`RecorderSink`] buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RecordedEvent {
    /// Update traversal started.
    UpdateBegin,
    /// Update traversal finished.
    UpdateEnd(UpdateSummary),
    /// Render traversal started: `(root, x0, y0, x1, y1)`.
    RenderBegin(u32, i32, i32, i32, i32),
    /// Render traversal finished.
    RenderEnd(RenderSummary),
    /// A cache applied a scheduled transform.
    CacheRemap(CacheRemapEvent),
    /// A pick resolved: `(x, y, delta, hit)`.
    Pick(f64, f64, f64, Option<u32>),
    /// Damage rects were reported (count only).
    DamageCount(u32),
}

/// Decodes a recorded buffer into events.
///
/// Stops at the first malformed record (truncated buffer or unknown tag).
#[must_use]
pub fn decode(bytes: &[u8]) -> Vec<RecordedEvent> {
    let mut events = Vec::new();
    let mut cursor = Cursor { bytes, pos: 0 };
    while let Some(tag) = cursor.u8() {
        let event = match tag {
            TAG_UPDATE_BEGIN => Some(RecordedEvent::UpdateBegin),
            TAG_UPDATE_END => (|| {
                Some(RecordedEvent::UpdateEnd(UpdateSummary {
                    transforms: cursor.u32()?,
                    bboxes: cursor.u32()?,
                    styles: cursor.u32()?,
                    content: cursor.u32()?,
                    added: cursor.u32()?,
                    removed: cursor.u32()?,
                    topology_changed: cursor.u8()? != 0,
                }))
            })(),
            TAG_RENDER_BEGIN => (|| {
                Some(RecordedEvent::RenderBegin(
                    cursor.u32()?,
                    cursor.i32()?,
                    cursor.i32()?,
                    cursor.i32()?,
                    cursor.i32()?,
                ))
            })(),
            TAG_RENDER_END => (|| {
                Some(RecordedEvent::RenderEnd(RenderSummary {
                    painted: cursor.u32()?,
                    cache_hits: cursor.u32()?,
                    cache_misses: cursor.u32()?,
                }))
            })(),
            TAG_CACHE_REMAP => (|| {
                let item = cursor.u32()?;
                let kind = match cursor.u8()? {
                    0 => RemapKind::Noop,
                    1 => RemapKind::Translation,
                    2 => RemapKind::Repaint,
                    _ => return None,
                };
                Some(RecordedEvent::CacheRemap(CacheRemapEvent { item, kind }))
            })(),
            TAG_PICK => (|| {
                let x = cursor.f64()?;
                let y = cursor.f64()?;
                let delta = cursor.f64()?;
                let hit = cursor.u32()?;
                Some(RecordedEvent::Pick(
                    x,
                    y,
                    delta,
                    (hit != NO_HIT).then_some(hit),
                ))
            })(),
            TAG_DAMAGE_COUNT => cursor.u32().map(RecordedEvent::DamageCount),
            _ => None,
        };
        match event {
            Some(event) => events.push(event),
            None => break,
        }
    }
    events
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn u8(&mut self) -> Option<u8> {
        let b = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let slice = self.bytes.get(self.pos..self.pos + N)?;
        self.pos += N;
        slice.try_into().ok()
    }

    fn u32(&mut self) -> Option<u32> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    fn i32(&mut self) -> Option<i32> {
        self.take::<4>().map(i32::from_le_bytes)
    }

    fn f64(&mut self) -> Option<f64> {
        self.take::<8>().map(f64::from_le_bytes)
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Point;
    use sgraffito_core::geom::IntRect;
    use sgraffito_core::trace::Tracer;

    use super::*;

    #[test]
    fn round_trip() {
        let mut sink = RecorderSink::new();
        {
            let mut tracer = Tracer::new(&mut sink);
            tracer.update_begin();
            tracer.update_end(&UpdateSummary {
                transforms: 3,
                bboxes: 2,
                styles: 1,
                content: 0,
                added: 4,
                removed: 5,
                topology_changed: true,
            });
            tracer.render_begin(&RenderBeginEvent {
                root: 9,
                area: IntRect::new(-4, 0, 16, 32).unwrap(),
            });
            tracer.render_end(&RenderSummary {
                painted: 7,
                cache_hits: 1,
                cache_misses: 2,
            });
            tracer.cache_remap(11, RemapKind::Repaint);
            tracer.pick(Point::new(1.5, -2.5), 3.0, Some(42));
            tracer.pick(Point::new(0.0, 0.0), 0.0, None);
        }

        let events = decode(sink.as_bytes());
        assert_eq!(events.len(), 7);
        assert_eq!(events[0], RecordedEvent::UpdateBegin);
        assert_eq!(
            events[2],
            RecordedEvent::RenderBegin(9, -4, 0, 16, 32)
        );
        assert_eq!(
            events[4],
            RecordedEvent::CacheRemap(CacheRemapEvent {
                item: 11,
                kind: RemapKind::Repaint,
            })
        );
        assert_eq!(events[5], RecordedEvent::Pick(1.5, -2.5, 3.0, Some(42)));
        assert_eq!(events[6], RecordedEvent::Pick(0.0, 0.0, 0.0, None));
    }

    #[test]
    fn truncated_buffer_stops_cleanly() {
        let mut sink = RecorderSink::new();
        {
            let mut tracer = Tracer::new(&mut sink);
            tracer.update_begin();
            tracer.cache_remap(1, RemapKind::Noop);
        }
        let bytes = sink.into_bytes();
        // Drop the last byte of the remap record.
        let events = decode(&bytes[..bytes.len() - 1]);
        assert_eq!(events, vec![RecordedEvent::UpdateBegin]);
    }

    #[test]
    fn unknown_tag_stops_decoding() {
        let events = decode(&[0xEE, 1, 2, 3]);
        assert!(events.is_empty());
    }
}
