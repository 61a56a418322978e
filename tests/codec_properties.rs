//! End-to-end properties of the telemetry and command codec

mod common;

use common::*;

#[test]
fn test_whole_frame_sum_and_bit_flips() {
    let frame = telemetry_frame(&[(26, 0x12), (79, 0x30), (120, 0xEE)]);
    assert!(is_valid(ChecksumRule::SumModuloZeroOverWholeFrame, &frame));

    for byte in 0..frame.len() {
        for bit in 0..8 {
            let mut flipped = frame.clone();
            flipped[byte] ^= 1 << bit;
            assert!(
                !is_valid(ChecksumRule::SumModuloZeroOverWholeFrame, &flipped),
                "flip of bit {} in byte {} went unnoticed",
                bit,
                byte
            );
        }
    }
}

#[test]
fn test_garbage_frame_garbage_frame() {
    let profile = builtin(ProfileVersion::B).unwrap();
    let mut scanner = FrameScanner::new(profile);

    let first = telemetry_frame(&[(50, 0x01)]);
    let second = telemetry_frame(&[(50, 0x02)]);
    let mut stream = noise(50, 7);
    stream.extend_from_slice(&first);
    stream.extend_from_slice(&noise(10, 11));
    stream.extend_from_slice(&second);

    let frames = scanner.feed(&stream);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].bytes(), first.as_slice());
    assert_eq!(frames[1].bytes(), second.as_slice());
}

#[test]
fn test_split_70_63() {
    let profile = builtin(ProfileVersion::B).unwrap();
    let mut scanner = FrameScanner::new(profile);
    let frame = telemetry_frame(&[]);

    assert!(scanner.feed(&frame[..70]).is_empty());
    let frames = scanner.feed(&frame[70..]);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].len(), 133);
}

#[test]
fn test_every_chunking_yields_same_frames() {
    let profile = builtin(ProfileVersion::B).unwrap();
    let mut stream = noise(17, 3);
    for fill in 0..4u8 {
        stream.extend_from_slice(&telemetry_frame(&[(100, fill)]));
        stream.extend_from_slice(&noise(fill as usize * 5, fill as u32 + 1));
    }

    for chunk in [1, 2, 7, 64, 133, 200, 1000] {
        let mut scanner = FrameScanner::new(profile.clone());
        let frames: Vec<_> = stream.chunks(chunk).flat_map(|c| scanner.feed(c)).collect();
        assert_eq!(frames.len(), 4, "chunk size {}", chunk);
        for (fill, frame) in frames.iter().enumerate() {
            assert_eq!(frame.bytes()[100], fill as u8);
        }
    }
}

#[test]
fn test_decoded_voltage_display() {
    let profile = builtin(ProfileVersion::B).unwrap();
    let mut scanner = FrameScanner::new(profile.clone());
    let frame = scanner
        .feed(&telemetry_frame(&[(26, 0x01), (27, 0x00)]))
        .pop()
        .unwrap();

    let record = decode(&profile, frame).unwrap();
    assert_eq!(record.get(26).unwrap().display, "0.065 V");
}

#[test]
fn test_classification_examples() {
    assert_eq!(
        classify(&RangeRule::Bounded { min: 0, max: 255 }, 128),
        Classification::Valid
    );
    assert_eq!(classify(&RangeRule::Exact(0x41), 0x00), Classification::OutOfRange);
}

#[test]
fn test_error_mask_examples() {
    let profile = builtin(ProfileVersion::B).unwrap();
    let flag = |offset: usize, raw: u8| {
        decode_bytes(&profile, &telemetry_frame(&[(offset, raw)]))
            .unwrap()
            .get(offset)
            .unwrap()
            .is_error
    };

    // I2C_ACK_STATUS_1: nonzero mask
    assert_eq!(flag(6, 0x01), Some(true));
    assert_eq!(flag(6, 0x00), Some(false));
    // CPU_STATUS: bit 0 mask
    assert_eq!(flag(12, 0x02), Some(false));
    assert_eq!(flag(12, 0x01), Some(true));
}

#[test]
fn test_encoded_commands_verify() {
    let profile = builtin(ProfileVersion::B).unwrap();
    let states = [
        ControlState::default(),
        ControlState {
            sense_mode: SenseMode::Open28V,
            discrete_outputs: [0, 1, 2, 3].into_iter().collect(),
            leds: Leds {
                red: true,
                green: true,
                blue: true,
            },
            zeroize: ZeroizeCode::AllSata,
        },
    ];

    for state in &states {
        let frame = encode(&profile, state).unwrap();
        assert_eq!(frame.len(), 37);
        assert!(is_valid(ChecksumRule::SumComplementExcludingChecksum, frame.as_bytes()));
    }
}

#[test]
fn test_profiles_disagree_on_layout() {
    let frame = telemetry_frame(&[(30, 0x7F)]);
    let a = decode_bytes(&builtin(ProfileVersion::A).unwrap(), &frame).unwrap();
    let b = decode_bytes(&builtin(ProfileVersion::B).unwrap(), &frame).unwrap();

    assert_eq!(a.get(30).unwrap().name, "LTC4281_PMON_VOLTAGE_1");
    assert_eq!(a.get(30).unwrap().display, "0x7F");
    assert_eq!(b.get(30).unwrap().name, "LTC4281_CPU_POWER_1");
    assert!(b.get(30).unwrap().display.ends_with(" W"));
}
