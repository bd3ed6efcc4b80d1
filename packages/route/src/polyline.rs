//! Google encoded-polyline decoding.
//!
//! Follows the algorithm described at
//! <https://developers.google.com/maps/documentation/utilities/polylinealgorithm>:
//! each coordinate is a zigzag-encoded delta from the previous point,
//! packed into base-64-ish chunks of 5 bits offset by 63, at 1e-5 degree
//! precision.

use thiserror::Error;

/// Errors that can occur while decoding a polyline.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolylineError {
    /// A coordinate chunk ended mid-value.
    #[error("Polyline truncated at byte {position}")]
    Truncated {
        /// Byte offset where input ran out.
        position: usize,
    },

    /// A character outside the encoding alphabet was encountered.
    #[error("Invalid polyline character {character:?} at byte {position}")]
    InvalidCharacter {
        /// The offending character.
        character: char,
        /// Byte offset of the character.
        position: usize,
    },
}

/// Decodes one varint-packed signed delta starting at `*index`.
fn decode_delta(bytes: &[u8], index: &mut usize) -> Result<i64, PolylineError> {
    let mut shift = 0u32;
    let mut result = 0i64;

    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(PolylineError::Truncated { position: *index });
        };
        if !(63..=126).contains(&byte) {
            return Err(PolylineError::InvalidCharacter {
                character: char::from(byte),
                position: *index,
            });
        }
        *index += 1;

        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;

        if chunk < 0x20 {
            break;
        }
    }

    // Zigzag: the low bit carries the sign.
    Ok(if result & 1 == 1 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

/// Decodes an encoded polyline into `(latitude, longitude)` pairs in
/// degrees.
///
/// An empty string decodes to an empty path.
///
/// # Errors
///
/// Returns [`PolylineError`] if the input is truncated mid-coordinate or
/// contains characters outside the encoding alphabet.
pub fn decode(encoded: &str) -> Result<Vec<(f64, f64)>, PolylineError> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut index = 0;
    let mut lat = 0i64;
    let mut lng = 0i64;

    while index < bytes.len() {
        lat += decode_delta(bytes, &mut index)?;
        lng += decode_delta(bytes, &mut index)?;

        #[allow(clippy::cast_precision_loss)]
        points.push((lat as f64 / 1e5, lng as f64 / 1e5));
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_the_reference_path() {
        // Worked example from the Google polyline documentation.
        let points = decode("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();

        assert_eq!(points.len(), 3);
        let expected = [(38.5, -120.2), (40.7, -120.95), (43.252, -126.453)];
        for ((lat, lng), (exp_lat, exp_lng)) in points.iter().zip(expected) {
            assert!((lat - exp_lat).abs() < 1e-9);
            assert!((lng - exp_lng).abs() < 1e-9);
        }
    }

    #[test]
    fn decodes_a_single_point() {
        let points = decode("_p~iF~ps|U").unwrap();
        assert_eq!(points.len(), 1);
        assert!((points[0].0 - 38.5).abs() < 1e-9);
        assert!((points[0].1 - -120.2).abs() < 1e-9);
    }

    #[test]
    fn empty_input_decodes_to_empty_path() {
        assert_eq!(decode("").unwrap(), Vec::new());
    }

    #[test]
    fn truncated_input_is_an_error() {
        assert!(matches!(
            decode("_p~iF"),
            Err(PolylineError::Truncated { .. })
        ));
    }

    #[test]
    fn out_of_alphabet_character_is_an_error() {
        assert!(matches!(
            decode("_p~iF~ps|U\n"),
            Err(PolylineError::InvalidCharacter { .. })
        ));
    }
}
