use serde::{Deserialize, Serialize};

/// Knobs for how forgiving pixel data decoding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Bound every RLE row by the length declared in the row table.
    ///
    /// When `false` the row table is read and ignored, and row boundaries come from the
    /// control bytes alone. That matches older readers but lets a bad row desynchronize
    /// every row after it.
    pub strict_row_lengths: bool,
    /// Decode channels with an unknown compression tag as blank (zero) image data instead
    /// of failing.
    pub allow_unknown_compression: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            strict_row_lengths: true,
            allow_unknown_compression: true,
        }
    }
}

impl DecodeOptions {
    /// Rejects anything that does not decode cleanly.
    pub fn strict() -> Self {
        Self {
            strict_row_lengths: true,
            allow_unknown_compression: false,
        }
    }

    /// Reproduces the behaviour of older readers.
    pub fn lenient() -> Self {
        Self {
            strict_row_lengths: false,
            allow_unknown_compression: true,
        }
    }
}
