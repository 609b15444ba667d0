use aes::{Aes128, Aes192, Aes256};
use base64::{Engine, engine::general_purpose};
use cipher::{BlockDecrypt, KeyInit, generic_array::GenericArray};

use crate::CzError;

const AES_BLOCK_SIZE: usize = 16;

/// Decode the base64 AES key and validate its length.
///
/// 解码 base64 AES 密钥并校验长度（16/24/32 字节）。
pub fn decode_aes_key(key: &str) -> Result<Vec<u8>, CzError> {
    let key_bytes = general_purpose::STANDARD.decode(key.trim())?;
    match key_bytes.len() {
        16 | 24 | 32 => Ok(key_bytes),
        len => Err(CzError::InvalidAesKeyLength(len)),
    }
}

fn decrypt_blocks<C: BlockDecrypt + KeyInit>(
    data: &mut [u8],
    key_bytes: &[u8],
) -> Result<(), CzError> {
    let cipher =
        C::new_from_slice(key_bytes).map_err(|_| CzError::InvalidAesKeyLength(key_bytes.len()))?;
    for block in data.chunks_exact_mut(AES_BLOCK_SIZE) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }
    Ok(())
}

/// Decrypt AES blocks independently (ECB) without removing padding.
///
/// The key size picks AES-128, AES-192 or AES-256.
///
/// 以 ECB 方式逐块 AES 解密，不去除填充。
pub fn aes_decrypt_ecb(cipher_bytes: &[u8], key_bytes: &[u8]) -> Result<Vec<u8>, CzError> {
    if cipher_bytes.len() % AES_BLOCK_SIZE != 0 {
        return Err(CzError::MisalignedCiphertext(cipher_bytes.len()));
    }
    let mut plain = cipher_bytes.to_vec();
    match key_bytes.len() {
        16 => decrypt_blocks::<Aes128>(&mut plain, key_bytes)?,
        24 => decrypt_blocks::<Aes192>(&mut plain, key_bytes)?,
        32 => decrypt_blocks::<Aes256>(&mut plain, key_bytes)?,
        len => return Err(CzError::InvalidAesKeyLength(len)),
    }
    Ok(plain)
}

/// Repeating-key XOR. Applying it twice with the same key restores the input.
///
/// 循环密钥异或解密。
pub fn xor_decrypt(data: &[u8], key_bytes: &[u8]) -> Vec<u8> {
    if key_bytes.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .zip(key_bytes.iter().cycle())
        .map(|(byte, key)| byte ^ key)
        .collect()
}
