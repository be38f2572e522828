//! Streaming CRC-32 (reflected 0xEDB88320, the zip/PNG variant)

const POLYNOMIAL: u32 = 0xEDB8_8320;
const SEED: u32 = 0xFFFF_FFFF;

static TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { POLYNOMIAL ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

/// Running CRC-32 register.
///
/// Sections can be fed in any order and across any number of `update`
/// calls; the container checksum depends on feeding them in the encoder's
/// section order, not file order.
#[derive(Debug, Clone)]
pub struct Crc32 {
    register: u32,
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32 {
    pub fn new() -> Self {
        Self { register: SEED }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        let mut crc = self.register;
        for &byte in bytes {
            crc = TABLE[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8);
        }
        self.register = crc;
    }

    /// Returns the checksum of everything fed so far.
    ///
    /// With `reset` the register returns to its seed; otherwise it is left
    /// as is and later updates keep accumulating.
    pub fn finalize(&mut self, reset: bool) -> u32 {
        let crc = !self.register;
        if reset {
            self.register = SEED;
        }
        crc
    }
}

/// One-shot CRC-32 of a buffer
pub fn checksum(bytes: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(bytes);
    crc.finalize(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn test_split_updates_match_single_update() {
        let data = b"The quick brown fox jumps over the lazy dog";
        let mut crc = Crc32::new();
        for chunk in data.chunks(5) {
            crc.update(chunk);
        }
        assert_eq!(crc.finalize(true), checksum(data));
        assert_eq!(checksum(data), 0x414F_A339);
    }

    #[test]
    fn test_finalize_without_reset_keeps_accumulating() {
        let mut crc = Crc32::new();
        crc.update(b"1234");
        let partial = crc.finalize(false);
        assert_eq!(partial, checksum(b"1234"));

        crc.update(b"56789");
        assert_eq!(crc.finalize(false), 0xCBF4_3926);
    }

    #[test]
    fn test_reset_makes_instance_reusable() {
        let mut crc = Crc32::new();
        crc.update(b"garbage");
        crc.finalize(true);

        crc.update(b"123456789");
        assert_eq!(crc.finalize(true), 0xCBF4_3926);
    }
}
