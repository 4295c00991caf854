//! Block Cipher Oracle
//!
//! Single-block, IV-less encryption used to answer the band's challenge.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

/// Encrypts one 16-byte block under a 16-byte key
pub trait CipherOracle: Sync {
    fn encrypt_block(&self, key: &[u8; 16], plaintext: &[u8; 16]) -> [u8; 16];
}

/// AES-128 in ECB mode, one block at a time
#[derive(Debug, Clone, Copy, Default)]
pub struct Aes128Ecb;

impl CipherOracle for Aes128Ecb {
    fn encrypt_block(&self, key: &[u8; 16], plaintext: &[u8; 16]) -> [u8; 16] {
        let cipher = Aes128::new(GenericArray::from_slice(key.as_slice()));
        let mut block = GenericArray::clone_from_slice(plaintext.as_slice());
        cipher.encrypt_block(&mut block);

        let mut out = [0u8; 16];
        out.copy_from_slice(&block);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fips197_vector() {
        let key: [u8; 16] = core::array::from_fn(|i| i as u8);
        let plaintext = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD,
            0xEE, 0xFF,
        ];
        let expected = [
            0x69, 0xC4, 0xE0, 0xD8, 0x6A, 0x7B, 0x04, 0x30, 0xD8, 0xCD, 0xB7, 0x80, 0x70, 0xB4,
            0xC5, 0x5A,
        ];
        assert_eq!(Aes128Ecb.encrypt_block(&key, &plaintext), expected);
    }

    #[test]
    fn test_deterministic() {
        let key = [0x42; 16];
        let block = [0x07; 16];
        assert_eq!(
            Aes128Ecb.encrypt_block(&key, &block),
            Aes128Ecb.encrypt_block(&key, &block)
        );
        assert_ne!(Aes128Ecb.encrypt_block(&key, &block), block);
    }
}
