use byteorder::{LittleEndian, ReadBytesExt};
use chrono::NaiveDate;
use std::io::Cursor;

use crate::{CzError, crypto::aes_decrypt_ecb, source::DataSource};

/// Plain prefix: version, client id and encrypted block size.
pub const HYPER_HEADER_PREFIX_LENGTH: usize = 12;
const MAX_ENCRYPTED_BLOCK_SIZE: i32 = 1_000_000;
const CLIENT_ID_SHIFT: u32 = 20;
const EXPIRATION_DATE_MASK: u32 = 0xFFFFF;

/// Fields unpacked from the AES-encrypted part of the hyper header.
///
/// 超头加密块解密后的字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptedSecret {
    /// Top 12 bits of the first word.
    pub client_id: u32,
    /// Low 20 bits of the first word, a `yyMMdd` date.
    pub expiration_date: u32,
    /// Bytes of random padding between the hyper header and the super block.
    pub random_padding_size: i32,
}

impl DecryptedSecret {
    /// Unpack the secret from decrypted bytes.
    pub fn from_bytes(decrypted: &[u8]) -> Result<Self, CzError> {
        if decrypted.len() < 8 {
            return Err(CzError::TruncatedSecret(decrypted.len()));
        }
        let mut cursor = Cursor::new(decrypted);
        let packed = cursor.read_u32::<LittleEndian>()?;
        let random_padding_size = cursor.read_i32::<LittleEndian>()?;
        Ok(Self {
            client_id: packed >> CLIENT_ID_SHIFT,
            expiration_date: packed & EXPIRATION_DATE_MASK,
            random_padding_size,
        })
    }

    /// Returns true if `today` is past the expiration date.
    ///
    /// 判断数据库在给定日期是否已过期。
    pub fn is_expired_at(&self, today: NaiveDate) -> bool {
        let today: u32 = today.format("%y%m%d").to_string().parse().unwrap_or(u32::MAX);
        today > self.expiration_date
    }
}

/// The outermost header: plain version and client id plus the decrypted secret.
///
/// 数据库超头。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HyperHeader {
    pub version: i32,
    pub client_id: i32,
    pub encrypted_block_size: i32,
    pub secret: DecryptedSecret,
}

impl HyperHeader {
    /// Read and decrypt the hyper header at the start of `source`.
    ///
    /// 读取并解密超头。
    pub fn read<S: DataSource + ?Sized>(source: &S, key_bytes: &[u8]) -> Result<Self, CzError> {
        let prefix = source.read_at(0, HYPER_HEADER_PREFIX_LENGTH)?;
        let mut cursor = Cursor::new(prefix.as_ref());
        let version = cursor.read_i32::<LittleEndian>()?;
        let client_id = cursor.read_i32::<LittleEndian>()?;
        let encrypted_block_size = cursor.read_i32::<LittleEndian>()?;
        if encrypted_block_size <= 0 || encrypted_block_size > MAX_ENCRYPTED_BLOCK_SIZE {
            return Err(CzError::InvalidBlockSize(encrypted_block_size));
        }

        let encrypted = source.read_at(
            HYPER_HEADER_PREFIX_LENGTH as u64,
            encrypted_block_size as usize,
        )?;
        let decrypted = aes_decrypt_ecb(&encrypted, key_bytes)?;
        let secret = DecryptedSecret::from_bytes(&decrypted)?;
        if secret.random_padding_size < 0 {
            return Err(CzError::InvalidPaddingSize(secret.random_padding_size));
        }

        Ok(Self {
            version,
            client_id,
            encrypted_block_size,
            secret,
        })
    }

    /// Size of the plain prefix plus the encrypted block.
    pub fn size(&self) -> u64 {
        HYPER_HEADER_PREFIX_LENGTH as u64 + self.encrypted_block_size as u64
    }

    /// Absolute offset of the super block: header size plus random padding.
    ///
    /// 超级块的绝对偏移。
    pub fn data_offset(&self) -> u64 {
        self.size() + self.secret.random_padding_size as u64
    }

    /// Check the client id and the expiration date against `today`.
    ///
    /// 校验客户端 ID 与有效期。
    pub fn verify_license(&self, today: NaiveDate) -> Result<(), CzError> {
        if self.client_id < 0 || self.secret.client_id != self.client_id as u32 {
            return Err(CzError::InvalidClientId {
                header: self.client_id,
                secret: self.secret.client_id,
            });
        }
        if self.secret.is_expired_at(today) {
            return Err(CzError::DatabaseExpired(self.secret.expiration_date));
        }
        Ok(())
    }
}
