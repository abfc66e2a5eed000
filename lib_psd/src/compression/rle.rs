use thiserror::Error;

/// Longest run or literal span a single PackBits packet can describe.
pub const MAX_PACKET_LENGTH: usize = 128;

/// Most decoded bytes one encoded byte can stand for: a two-byte run packet expands to 128.
pub const MAX_EXPANSION: usize = MAX_PACKET_LENGTH / 2;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RleDecodeError {
    #[error("Unexpected end of RLE data after {produced} of {expected} row bytes")]
    Truncated { produced: usize, expected: usize },
    #[error("RLE packet of {packet} bytes overruns the row at byte {produced} of {expected}")]
    Overrun {
        packet: usize,
        produced: usize,
        expected: usize,
    },
}

/// Decodes one PackBits scanline from `src` into `dst`, stopping as soon as `dst` is full.
///
/// Returns the number of bytes of `src` that were consumed.
///
/// # Errors
/// - `RleDecodeError::Truncated` if `src` runs out before `dst` is full
/// - `RleDecodeError::Overrun` if a packet would write past the end of `dst`
pub fn decode_row(src: &[u8], dst: &mut [u8]) -> Result<usize, RleDecodeError> {
    let expected = dst.len();
    let truncated = |produced| RleDecodeError::Truncated { produced, expected };

    let mut pos = 0;
    let mut produced = 0;

    while produced < expected {
        let control = *src.get(pos).ok_or_else(|| truncated(produced))? as i8;
        pos += 1;

        if control >= 0 {
            let count = control as usize + 1;
            if produced + count > expected {
                return Err(RleDecodeError::Overrun {
                    packet: count,
                    produced,
                    expected,
                });
            }
            let literal = src
                .get(pos..pos + count)
                .ok_or_else(|| truncated(produced))?;
            dst[produced..produced + count].copy_from_slice(literal);
            pos += count;
            produced += count;
        } else if control != -128 {
            let count = (1 - control as isize) as usize;
            if produced + count > expected {
                return Err(RleDecodeError::Overrun {
                    packet: count,
                    produced,
                    expected,
                });
            }
            let value = *src.get(pos).ok_or_else(|| truncated(produced))?;
            dst[produced..produced + count].fill(value);
            pos += 1;
            produced += count;
        }
        // -128 is a no-op
    }

    Ok(pos)
}

/// Encodes one scanline with PackBits, appending to `out`.
///
/// Repeats of two or more bytes become run packets, everything else is gathered into literal
/// packets. Both kinds are capped at 128 bytes. Returns the number of bytes appended.
pub fn encode_row(src: &[u8], out: &mut Vec<u8>) -> usize {
    let start_len = out.len();
    let mut i = 0;

    while i < src.len() {
        let run = run_length(&src[i..]);

        if run >= 2 {
            out.push((1 - run as i16) as i8 as u8);
            out.push(src[i]);
            i += run;
        } else {
            let literal_start = i;
            while i < src.len() && i - literal_start < MAX_PACKET_LENGTH {
                if i + 1 < src.len() && src[i] == src[i + 1] {
                    break;
                }
                i += 1;
            }
            let literal = &src[literal_start..i];
            out.push((literal.len() - 1) as u8);
            out.extend_from_slice(literal);
        }
    }

    out.len() - start_len
}

/// Number of leading bytes equal to the first one, capped at one packet.
fn run_length(src: &[u8]) -> usize {
    let first = src[0];
    src.iter()
        .take(MAX_PACKET_LENGTH)
        .take_while(|&&b| b == first)
        .count()
}
