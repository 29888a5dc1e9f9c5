//! Single byte-range negotiation for the `Range` request header.

/// Inclusive byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// `Content-Range` value for a 206 response.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// How a request's `Range` header applies to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// Serve the whole file with 200
    Full,
    /// Serve this range with 206
    Partial(ByteRange),
    /// Respond 416 with `Content-Range: bytes */size`
    Unsatisfiable,
}

/// Applies a `Range` header to a file of `size` bytes.
///
/// Supports `bytes=a-b`, `bytes=a-` and `bytes=-n`. An end past the file is
/// clamped. Headers that are missing, malformed, in another unit, reversed
/// (`a > b`) or that ask for several ranges are ignored and the whole file is
/// served.
pub fn parse_range(header: Option<&str>, size: u64) -> RangeOutcome {
    let Some(range_set) = header.and_then(strip_bytes_unit) else {
        return RangeOutcome::Full;
    };
    if range_set.contains(',') {
        return RangeOutcome::Full;
    }
    let Some((first, last)) = range_set.split_once('-') else {
        return RangeOutcome::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        let Ok(suffix) = last.parse::<u64>() else {
            return RangeOutcome::Full;
        };
        if suffix == 0 || size == 0 {
            return RangeOutcome::Unsatisfiable;
        }
        return RangeOutcome::Partial(ByteRange {
            start: size.saturating_sub(suffix),
            end: size - 1,
        });
    }

    let Ok(start) = first.parse::<u64>() else {
        return RangeOutcome::Full;
    };
    let end = if last.is_empty() {
        None
    } else {
        match last.parse::<u64>() {
            Ok(end) if end >= start => Some(end),
            _ => return RangeOutcome::Full,
        }
    };

    if start >= size {
        return RangeOutcome::Unsatisfiable;
    }
    let end = end.map_or(size - 1, |end| end.min(size - 1));
    RangeOutcome::Partial(ByteRange { start, end })
}

fn strip_bytes_unit(header: &str) -> Option<&str> {
    let header = header.trim();
    let (unit, range_set) = header.split_once('=')?;
    unit.trim().eq_ignore_ascii_case("bytes").then_some(range_set)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn partial(start: u64, end: u64) -> RangeOutcome {
        RangeOutcome::Partial(ByteRange { start, end })
    }

    #[test]
    fn test_closed_range() {
        assert_eq!(parse_range(Some("bytes=100-199"), 1000), partial(100, 199));
        assert_eq!(parse_range(Some("bytes=0-0"), 1000), partial(0, 0));
    }

    #[test]
    fn test_open_ended_range() {
        assert_eq!(parse_range(Some("bytes=500-"), 1000), partial(500, 999));
    }

    #[test]
    fn test_suffix_range() {
        assert_eq!(parse_range(Some("bytes=-100"), 1000), partial(900, 999));
        assert_eq!(parse_range(Some("bytes=-5000"), 1000), partial(0, 999));
        assert_eq!(parse_range(Some("bytes=-0"), 1000), RangeOutcome::Unsatisfiable);
    }

    #[test]
    fn test_end_is_clamped() {
        assert_eq!(parse_range(Some("bytes=100-5000"), 1000), partial(100, 999));
    }

    #[test]
    fn test_unsatisfiable_start() {
        assert_eq!(parse_range(Some("bytes=1000-"), 1000), RangeOutcome::Unsatisfiable);
        assert_eq!(parse_range(Some("bytes=2000-3000"), 1000), RangeOutcome::Unsatisfiable);
        assert_eq!(parse_range(Some("bytes=0-"), 0), RangeOutcome::Unsatisfiable);
    }

    #[test]
    fn test_ignored_headers_serve_full_file() {
        for header in [
            None,
            Some("items=0-10"),
            Some("bytes=abc-def"),
            Some("bytes=10"),
            Some("bytes=200-100"),
            Some("bytes=0-10,20-30"),
            Some(""),
        ] {
            assert_eq!(parse_range(header, 1000), RangeOutcome::Full, "{header:?}");
        }
    }

    #[test]
    fn test_content_range_value() {
        let range = ByteRange { start: 0, end: 99 };
        assert_eq!(range.content_range(1000), "bytes 0-99/1000");
        assert_eq!(range.len(), 100);
    }

    proptest! {
        #[test]
        fn prop_partial_ranges_stay_inside_file(
            size in 1u64..10_000_000,
            start in 0u64..20_000_000,
            len in 0u64..20_000_000,
        ) {
            let header = format!("bytes={}-{}", start, start + len);
            match parse_range(Some(&header), size) {
                RangeOutcome::Partial(range) => {
                    prop_assert!(range.start <= range.end);
                    prop_assert!(range.end < size);
                    prop_assert_eq!(range.start, start);
                }
                RangeOutcome::Unsatisfiable => prop_assert!(start >= size),
                RangeOutcome::Full => prop_assert!(false, "valid range ignored"),
            }
        }

        #[test]
        fn prop_suffix_ranges_end_at_last_byte(size in 1u64..10_000_000, suffix in 1u64..20_000_000) {
            let header = format!("bytes=-{suffix}");
            match parse_range(Some(&header), size) {
                RangeOutcome::Partial(range) => {
                    prop_assert_eq!(range.end, size - 1);
                    prop_assert_eq!(range.len(), suffix.min(size));
                }
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }

        #[test]
        fn prop_arbitrary_headers_never_panic(header in ".*", size in 0u64..1_000_000) {
            let _ = parse_range(Some(&header), size);
        }
    }
}
