use std::sync::OnceLock;

/// Fixed color tables and nearest-color lookup. The ansi256 cube/gray
/// ramp is generated once behind a `OnceLock` — the one piece of
/// process-wide mutable-ish state the core allows, and it's pure and
/// immutable after first use (DESIGN NOTES: "treat as a lazy const").
pub struct PaletteTables;

/// The 16 VGA/DOS console colors, xterm's default mapping.
pub const ANSI16: [[u8; 3]; 16] = [
    [0, 0, 0],
    [205, 0, 0],
    [0, 205, 0],
    [205, 205, 0],
    [0, 0, 238],
    [205, 0, 205],
    [0, 205, 205],
    [229, 229, 229],
    [127, 127, 127],
    [255, 0, 0],
    [0, 255, 0],
    [255, 255, 0],
    [92, 92, 255],
    [255, 0, 255],
    [0, 255, 255],
    [255, 255, 255],
];

/// Classic 16-color CGA palette.
pub const CGA: [[u8; 3]; 16] = [
    [0, 0, 0],
    [0, 0, 170],
    [0, 170, 0],
    [0, 170, 170],
    [170, 0, 0],
    [170, 0, 170],
    [170, 85, 0],
    [170, 170, 170],
    [85, 85, 85],
    [85, 85, 255],
    [85, 255, 85],
    [85, 255, 255],
    [255, 85, 85],
    [255, 85, 255],
    [255, 255, 85],
    [255, 255, 255],
];

/// Game Boy DMG four-shade green ramp, lightest to darkest.
pub const GAMEBOY: [[u8; 3]; 4] = [
    [155, 188, 15],
    [139, 172, 15],
    [48, 98, 48],
    [15, 56, 15],
];

fn ansi256_table() -> [[u8; 3]; 256] {
    let mut table = [[0u8; 3]; 256];
    table[0..16].copy_from_slice(&ANSI16);

    let mut idx = 16;
    for r in 0..6u32 {
        for g in 0..6u32 {
            for b in 0..6u32 {
                let step = |i: u32| if i == 0 { 0 } else { (i * 40 + 55) as u8 };
                table[idx] = [step(r), step(g), step(b)];
                idx += 1;
            }
        }
    }

    for i in 0..24u32 {
        let v = (8 + i * 10) as u8;
        table[232 + i as usize] = [v, v, v];
    }

    table
}

static ANSI256: OnceLock<[[u8; 3]; 256]> = OnceLock::new();

impl PaletteTables {
    pub fn ansi16() -> &'static [[u8; 3]; 16] {
        &ANSI16
    }

    pub fn ansi256() -> &'static [[u8; 3]; 256] {
        ANSI256.get_or_init(ansi256_table)
    }

    pub fn cga() -> &'static [[u8; 3]; 16] {
        &CGA
    }

    pub fn gameboy() -> &'static [[u8; 3]; 4] {
        &GAMEBOY
    }

    /// Nearest entry in `palette` by squared Euclidean distance in RGB
    /// space; ties resolve to the earliest index.
    pub fn nearest_in_palette(r: u8, g: u8, b: u8, palette: &[[u8; 3]]) -> usize {
        let (r, g, b) = (r as i32, g as i32, b as i32);
        let mut best_idx = 0;
        let mut best_dist = i32::MAX;
        for (idx, &[pr, pg, pb]) in palette.iter().enumerate() {
            let dr = r - pr as i32;
            let dg = g - pg as i32;
            let db = b - pb as i32;
            let dist = dr * dr + dg * dg + db * db;
            if dist < best_dist {
                best_dist = dist;
                best_idx = idx;
            }
        }
        best_idx
    }
}
