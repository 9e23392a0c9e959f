// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `codec.rs`

#[cfg(test)]
mod tests {
    use crate::codec::{decode, pack_json, to_json, MapEncoder, Object};
    use crate::constants::MAX_DECODE_DEPTH;
    use crate::errors::{DecodeError, EncodeError};
    use serde_json::json;

    // =====================================================
    // Decoding
    // =====================================================

    #[test]
    fn test_decode_map_keeps_order_and_duplicates() {
        // {"b": 1, "a": 2, "b": 3}
        let buf = [0x83, 0xa1, b'b', 0x01, 0xa1, b'a', 0x02, 0xa1, b'b', 0x03];

        let object = decode(&buf).unwrap();
        let map = object.as_map().unwrap();

        assert_eq!(map.len(), 3);
        assert!(map.entries()[0].0.is_str("b"));
        assert!(map.entries()[1].0.is_str("a"));
        assert!(map.entries()[2].0.is_str("b"));
        // First occurrence wins on lookup
        assert_eq!(map.get("b").unwrap().raw(), &[0x01]);
    }

    #[test]
    fn test_decode_raw_span_covers_whole_object() {
        let buf = pack_json(br#"{"labels": {"app": "web", "tier": ["a", "b"]}, "x": 1}"#).unwrap();

        let object = decode(&buf).unwrap();
        assert_eq!(object.raw(), &buf[..]);

        let labels = object.as_map().unwrap().get("labels").unwrap();
        let reparsed = decode(labels.raw()).unwrap();
        assert_eq!(&reparsed, labels);
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let buf = [0xa2, b'o', b'k', 0xff, 0xff];

        let object = decode(&buf).unwrap();

        assert_eq!(object.as_str(), Some("ok"));
        assert_eq!(object.raw().len(), 3);
    }

    #[test]
    fn test_decode_scalars_are_opaque() {
        let cases: [&[u8]; 8] = [
            &[0xc0],
            &[0xc3],
            &[0x7f],
            &[0xe0],
            &[0xcc, 0xff],
            &[0xcd, 0x01, 0x00],
            &[0xcb, 0, 0, 0, 0, 0, 0, 0, 0],
            &[0xc4, 0x02, 0xde, 0xad],
        ];

        for buf in cases {
            let object = decode(buf).unwrap();
            assert!(matches!(object, Object::Opaque(_)), "{buf:?}");
            assert_eq!(object.raw(), buf);
        }
    }

    #[test]
    fn test_decode_extension_types() {
        // fixext1: marker, type, one data byte
        let fixext = [0xd4, 0x01, 0x2a];
        // ext8: marker, length, type, data
        let ext8 = [0xc7, 0x02, 0x05, 0xaa, 0xbb];

        assert_eq!(decode(&fixext).unwrap().raw(), &fixext);
        assert_eq!(decode(&ext8).unwrap().raw(), &ext8);
    }

    #[test]
    fn test_decode_long_string_headers() {
        let text = "x".repeat(300);
        let mut buf = vec![0xda, 0x01, 0x2c];
        buf.extend_from_slice(text.as_bytes());

        let object = decode(&buf).unwrap();

        assert_eq!(object.as_str(), Some(text.as_str()));
    }

    #[test]
    fn test_decode_non_utf8_string() {
        let buf = [0xa2, 0xff, 0xfe];

        let object = decode(&buf).unwrap();

        assert!(matches!(object, Object::Str(_)));
        assert_eq!(object.as_str(), None);
    }

    #[test]
    fn test_decode_truncated_input() {
        assert_eq!(
            decode(&[]).unwrap_err(),
            DecodeError::UnexpectedEof { offset: 0 }
        );
        // Map of one entry with the value missing
        assert_eq!(
            decode(&[0x81, 0xa1, b'k']).unwrap_err(),
            DecodeError::UnexpectedEof { offset: 3 }
        );
        // String header claims more bytes than present
        assert_eq!(
            decode(&[0xa5, b'a', b'b']).unwrap_err(),
            DecodeError::UnexpectedEof { offset: 1 }
        );
    }

    #[test]
    fn test_decode_reserved_marker() {
        assert_eq!(
            decode(&[0x91, 0xc1]).unwrap_err(),
            DecodeError::ReservedMarker { offset: 1 }
        );
    }

    #[test]
    fn test_decode_depth_limit() {
        let mut buf = vec![0x91; MAX_DECODE_DEPTH + 1];
        buf.push(0xc0);

        assert_eq!(
            decode(&buf).unwrap_err(),
            DecodeError::TooDeep {
                max: MAX_DECODE_DEPTH
            }
        );

        let mut ok = vec![0x91; MAX_DECODE_DEPTH];
        ok.push(0xc0);
        assert!(decode(&ok).is_ok());
    }

    // =====================================================
    // Encoding
    // =====================================================

    #[test]
    fn test_map_encoder_strings() {
        let mut encoder = MapEncoder::new(2).unwrap();
        encoder.push_str("pod_name", "web-0").unwrap();
        encoder.push_str("namespace_name", "default").unwrap();
        let buf = encoder.finish().unwrap();

        assert_eq!(
            to_json(&buf).unwrap(),
            json!({"pod_name": "web-0", "namespace_name": "default"})
        );
    }

    #[test]
    fn test_map_encoder_copies_objects_verbatim() {
        let source = pack_json(br#"{"uid": "u-1", "labels": {"app": "web"}}"#).unwrap();
        let object = decode(&source).unwrap();
        let map = object.as_map().unwrap();
        let (labels_key, labels_value) = map.entry("labels").unwrap();

        let mut encoder = MapEncoder::new(2).unwrap();
        encoder.push_object(labels_key, labels_value);
        encoder.push_str_key("pod_id", map.get("uid").unwrap()).unwrap();
        let buf = encoder.finish().unwrap();

        assert_eq!(
            to_json(&buf).unwrap(),
            json!({"labels": {"app": "web"}, "pod_id": "u-1"})
        );
        // Header byte followed by the exact bytes of the copied entry
        assert_eq!(&buf[1..1 + labels_key.raw().len()], labels_key.raw());
    }

    #[test]
    fn test_map_encoder_rejects_short_map() {
        let mut encoder = MapEncoder::new(3).unwrap();
        encoder.push_str("a", "1").unwrap();

        assert_eq!(
            encoder.finish().unwrap_err(),
            EncodeError::SizeMismatch {
                declared: 3,
                written: 1
            }
        );
    }

    #[test]
    fn test_map_encoder_rejects_long_map() {
        let mut encoder = MapEncoder::new(0).unwrap();
        encoder.push_str("a", "1").unwrap();

        assert_eq!(
            encoder.finish().unwrap_err(),
            EncodeError::SizeMismatch {
                declared: 0,
                written: 1
            }
        );
    }

    #[test]
    fn test_map_encoder_large_header() {
        let mut encoder = MapEncoder::new(20).unwrap();
        for i in 0..20 {
            encoder.push_str(&format!("k{i}"), "v").unwrap();
        }
        let buf = encoder.finish().unwrap();

        // More than 15 entries needs a map16 header
        assert_eq!(buf[0], 0xde);
        assert_eq!(decode(&buf).unwrap().as_map().unwrap().len(), 20);
    }

    // =====================================================
    // JSON conversion
    // =====================================================

    #[test]
    fn test_pack_json_preserves_key_order() {
        let buf = pack_json(br#"{"zeta": 1, "alpha": 2, "mid": 3}"#).unwrap();

        let object = decode(&buf).unwrap();
        let keys: Vec<_> = object
            .as_map()
            .unwrap()
            .entries()
            .iter()
            .map(|(k, _)| k.as_str().unwrap())
            .collect();

        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_pack_json_rejects_invalid_document() {
        let err = pack_json(b"{not json").unwrap_err();

        assert!(matches!(err, DecodeError::Json { .. }));
    }

    #[test]
    fn test_to_json_round_trips_document() {
        let document = json!({
            "kind": "Pod",
            "metadata": {
                "uid": "u-1",
                "generation": 3,
                "deleted": null,
                "ready": true,
                "labels": {"app": "web"},
                "finalizers": ["a", "b"]
            }
        });

        let buf = pack_json(document.to_string().as_bytes()).unwrap();

        assert_eq!(to_json(&buf).unwrap(), document);
    }

    #[test]
    fn test_to_json_binary_becomes_null() {
        let buf = [0x81, 0xa1, b'b', 0xc4, 0x01, 0x00];

        assert_eq!(to_json(&buf).unwrap(), json!({"b": null}));
    }
}
