use ascii_gif::{encode_frames_to_gif, RgbaFrame};

fn gradient_frame(w: usize, h: usize, shift: u8) -> RgbaFrame {
    let mut pixels = Vec::with_capacity(w * h * 4);
    for y in 0..h {
        for x in 0..w {
            let r = ((x * 255 / w.max(1)) as u8).wrapping_add(shift);
            let g = ((y * 255 / h.max(1)) as u8).wrapping_add(shift);
            pixels.extend_from_slice(&[r, g, 128, 255]);
        }
    }
    RgbaFrame { pixels, delay_ms: 40 }
}

#[test]
fn encoded_gif_has_valid_header_and_trailer() {
    let frames = vec![gradient_frame(64, 64, 0), gradient_frame(64, 64, 40), gradient_frame(64, 64, 80)];
    let bytes = encode_frames_to_gif(&frames, 64, 64, 10, Some(0), None).unwrap();

    assert!(bytes.len() > 100, "GIF should be a substantial size");
    assert_eq!(&bytes[0..6], b"GIF89a");
    assert_eq!(*bytes.last().unwrap(), 0x3B);
}

#[test]
fn logical_screen_descriptor_declares_global_color_table() {
    let frames = vec![gradient_frame(64, 64, 0)];
    let bytes = encode_frames_to_gif(&frames, 64, 64, 10, None, None).unwrap();
    assert!(bytes.len() >= 13, "missing logical screen descriptor");
    let packed = bytes[10];
    assert_ne!(packed & 0x80, 0, "global color table flag must be set");
}

#[test]
fn loop_extension_presence_matches_request() {
    let frames = vec![gradient_frame(32, 32, 0)];

    let looping = encode_frames_to_gif(&frames, 32, 32, 10, Some(0), None).unwrap();
    let marker = b"NETSCAPE2.0";
    assert!(looping.windows(marker.len()).any(|w| w == marker));

    let non_looping = encode_frames_to_gif(&frames, 32, 32, 10, None, None).unwrap();
    assert!(!non_looping.windows(marker.len()).any(|w| w == marker));
}

#[test]
fn frame_count_matches_image_descriptors() {
    let frames: Vec<RgbaFrame> = (0..6).map(|i| gradient_frame(32, 32, i * 10)).collect();
    let bytes = encode_frames_to_gif(&frames, 32, 32, 10, Some(0), None).unwrap();
    let descriptor_count = bytes.iter().filter(|&&b| b == 0x2C).count();
    assert_eq!(descriptor_count, 6);
}

#[test]
fn identical_input_produces_identical_output() {
    let frames = vec![gradient_frame(48, 48, 0), gradient_frame(48, 48, 20)];
    let gif1 = encode_frames_to_gif(&frames, 48, 48, 10, Some(0), None).unwrap();
    let gif2 = encode_frames_to_gif(&frames, 48, 48, 10, Some(0), None).unwrap();
    assert_eq!(gif1, gif2, "deterministic input must produce byte-identical GIFs");
}

#[test]
fn monochrome_input_compresses_far_below_raw_size() {
    let w = 128usize;
    let h = 128usize;
    let frame = RgbaFrame { pixels: vec![17, 200, 90, 255].repeat(w * h), delay_ms: 40 };
    let bytes = encode_frames_to_gif(&[frame], w as u16, h as u16, 10, None, None).unwrap();
    let raw_size = w * h * 3;
    assert!(bytes.len() < raw_size / 4, "a constant-color frame should compress heavily");
}

#[test]
fn transparency_color_resolves_to_a_used_palette_index() {
    let frames = vec![gradient_frame(64, 64, 0)];
    let bytes = encode_frames_to_gif(&frames, 64, 64, 10, None, Some([128, 0, 128])).unwrap();
    // Graphic control extension's packed byte (4th byte of the block) carries the transparency flag.
    let gce_pos = bytes.iter().position(|&b| b == 0x21).unwrap();
    let packed = bytes[gce_pos + 3];
    assert_eq!(packed & 0x01, 0x01, "transparency flag should be set when a transparent color is configured");
}
