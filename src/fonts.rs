use std::num::NonZeroUsize;

use cosmic_text::{Attrs, Buffer, Family, FontSystem, Metrics, Shaping};
use lru::LruCache;

const CACHE_CAPACITY: usize = 4096;

#[derive(Hash, PartialEq, Eq, Clone)]
struct MeasureKey {
    text: String,
    font_size_bits: u32,
    max_width_bits: Option<u32>,
}

/// Label box measurement used by the layout engine.
pub trait TextMeasure {
    fn measure_text(&mut self, text: &str, font_size: f32, max_width: Option<f32>) -> (f32, f32);
}

/// Shaped measurement through the system font database.
pub struct CosmicTextMeasure {
    font_system: FontSystem,
    cache: LruCache<MeasureKey, (f32, f32)>,
}

impl CosmicTextMeasure {
    pub fn new() -> Self {
        Self {
            font_system: FontSystem::new(),
            cache: LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN)),
        }
    }
}

impl Default for CosmicTextMeasure {
    fn default() -> Self {
        Self::new()
    }
}

impl TextMeasure for CosmicTextMeasure {
    fn measure_text(&mut self, text: &str, font_size: f32, max_width: Option<f32>) -> (f32, f32) {
        let key = MeasureKey {
            text: text.to_string(),
            font_size_bits: font_size.to_bits(),
            max_width_bits: max_width.map(f32::to_bits),
        };

        if let Some(cached) = self.cache.get(&key) {
            return *cached;
        }

        let line_height = font_size * 1.2;
        let mut buffer = Buffer::new(
            &mut self.font_system,
            Metrics {
                font_size,
                line_height,
            },
        );
        buffer.set_size(&mut self.font_system, max_width, None);

        let attrs = Attrs::new().family(Family::SansSerif);
        buffer.set_text(&mut self.font_system, text, &attrs, Shaping::Advanced, None);

        let mut total_width: f32 = 0.0;
        let mut total_height: f32 = 0.0;
        for run in buffer.layout_runs() {
            total_width = total_width.max(run.line_w);
            total_height += run.line_height;
        }

        let measured = (total_width, total_height.max(line_height));
        self.cache.put(key, measured);
        measured
    }
}

/// Fixed-advance estimate; deterministic and font-free.
#[derive(Debug, Clone, Copy)]
pub struct ApproxTextMeasure {
    pub advance: f32,
}

impl Default for ApproxTextMeasure {
    fn default() -> Self {
        Self { advance: 0.6 }
    }
}

impl TextMeasure for ApproxTextMeasure {
    fn measure_text(&mut self, text: &str, font_size: f32, max_width: Option<f32>) -> (f32, f32) {
        let glyph = font_size * self.advance;
        let line_height = font_size * 1.2;
        let natural = text.chars().count() as f32 * glyph;
        match max_width {
            Some(limit) if limit > 0.0 && natural > limit => {
                let lines = (natural / limit).ceil();
                (limit, lines * line_height)
            }
            _ => (natural, line_height),
        }
    }
}
