mod tests {
    use bulb_fade_engine::error::Error;
    use bulb_fade_engine::lightbulb::{LightStatus, WorkMode};
    use bulb_fade_engine::storage::{NullStore, STATUS_BLOB_LEN, STATUS_SCHEMA_VERSION, StatusStore};

    fn sample() -> LightStatus {
        LightStatus {
            mode: WorkMode::White,
            on: true,
            hue: 300,
            saturation: 42,
            value: 87,
            cct_percentage: 61,
            brightness: 93,
        }
    }

    #[test]
    fn test_blob_round_trip() {
        let status = sample();
        let bytes = status.to_bytes();
        assert_eq!(bytes.len(), STATUS_BLOB_LEN);
        assert_eq!(bytes[0], STATUS_SCHEMA_VERSION);
        assert_eq!(LightStatus::from_bytes(&bytes).unwrap(), status);
    }

    #[test]
    fn test_hue_is_little_endian() {
        let bytes = sample().to_bytes();
        assert_eq!(u16::from_le_bytes([bytes[3], bytes[4]]), 300);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let mut bytes = sample().to_bytes();
        bytes[0] = STATUS_SCHEMA_VERSION + 1;
        assert_eq!(LightStatus::from_bytes(&bytes), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_truncated_blob_is_rejected() {
        let bytes = sample().to_bytes();
        assert_eq!(
            LightStatus::from_bytes(&bytes[..STATUS_BLOB_LEN - 1]),
            Err(Error::InvalidArgument)
        );
    }

    #[test]
    fn test_out_of_range_fields_are_rejected() {
        let mut bytes = sample().to_bytes();
        bytes[1] = 2; // unknown mode
        assert_eq!(LightStatus::from_bytes(&bytes), Err(Error::InvalidArgument));

        let mut bytes = sample().to_bytes();
        bytes[5] = 101; // saturation out of range
        assert_eq!(LightStatus::from_bytes(&bytes), Err(Error::InvalidArgument));

        let mut bytes = sample().to_bytes();
        bytes[3..5].copy_from_slice(&400u16.to_le_bytes()); // hue out of range
        assert_eq!(LightStatus::from_bytes(&bytes), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_null_store_discards() {
        let mut store = NullStore;
        store.save(&sample()).unwrap();
        assert_eq!(store.load(), Err(Error::InvalidState));
    }
}
