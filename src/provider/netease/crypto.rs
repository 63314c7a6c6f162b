//! weapi request signing.
//!
//! Every NetEase weapi call sends `{params, encSecKey}` instead of its plain
//! parameters:
//!
//! 1. a fresh 16-character secret is drawn for every call;
//! 2. `params` = base64(AES-128-CBC(base64(AES-128-CBC(json, PRESET_KEY)), secret));
//! 3. `encSecKey` = hex(reverse(secret) ^ 65537 mod N), left-padded to 256 digits.
//!
//! The preset key, IV, exponent and modulus are public client constants.

use std::fmt;
use std::sync::LazyLock;

use aes::Aes128;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use num_bigint::BigUint;
use rand::Rng;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;

const PRESET_KEY: &[u8; 16] = b"0CoJUm6Qyw8W8jud";
const IV: &[u8; 16] = b"0102030405060708";
const SECRET_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const PUBLIC_EXPONENT: u32 = 0x0001_0001;
const MODULUS_HEX: &str = "00e0b509f6259df8642dbc35662901477df22677ec152b5ff68ace615bb7b725152b3ab17a876aea8a5aa76d2e417629ec4ee341f56135fccf695280104e0312ecbda92557c93870114af6c9d05c4f7f0c3685b7a46bee255932575cce10b424d813cfe4875d3e82047b97ddef52741d546b8e289dc6935b3ece0462db0a22b8e7";
const ENC_SEC_KEY_DIGITS: usize = 256;

static MODULUS: LazyLock<BigUint> = LazyLock::new(|| {
    BigUint::parse_bytes(MODULUS_HEX.as_bytes(), 16)
        .unwrap_or_else(|| panic!("invalid weapi modulus constant"))
});

/// Transport-ready request fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSignature {
    pub params: String,
    pub enc_sec_key: String,
}

impl RequestSignature {
    /// Form body pairs for the signed call.
    #[must_use]
    pub fn form(&self) -> [(&'static str, &str); 2] {
        [("params", &self.params), ("encSecKey", &self.enc_sec_key)]
    }
}

/// Transforms serialized request parameters before transport.
pub trait RequestSigner: Send + Sync + fmt::Debug {
    /// Signs one request. Must be called fresh for every request.
    fn sign(&self, plaintext: &[u8]) -> RequestSignature;
}

/// The weapi hybrid encryption scheme.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeapiSigner;

impl WeapiSigner {
    /// Deterministic signing with a caller-supplied secret.
    #[must_use]
    pub fn sign_with_secret(plaintext: &[u8], secret: &[u8; 16]) -> RequestSignature {
        let first = STANDARD.encode(aes_cbc_encrypt(plaintext, PRESET_KEY));
        let params = STANDARD.encode(aes_cbc_encrypt(first.as_bytes(), secret));
        RequestSignature {
            params,
            enc_sec_key: encrypt_secret(secret),
        }
    }
}

impl RequestSigner for WeapiSigner {
    fn sign(&self, plaintext: &[u8]) -> RequestSignature {
        Self::sign_with_secret(plaintext, &random_secret())
    }
}

/// Sends the JSON parameters unencrypted as `params`.
///
/// Only useful against local mock servers that read the request body.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughSigner;

impl RequestSigner for PassthroughSigner {
    fn sign(&self, plaintext: &[u8]) -> RequestSignature {
        RequestSignature {
            params: String::from_utf8_lossy(plaintext).into_owned(),
            enc_sec_key: String::new(),
        }
    }
}

fn random_secret() -> [u8; 16] {
    let mut rng = rand::thread_rng();
    let mut secret = [0_u8; 16];
    for byte in &mut secret {
        *byte = SECRET_CHARSET[rng.gen_range(0..SECRET_CHARSET.len())];
    }
    secret
}

fn aes_cbc_encrypt(plaintext: &[u8], key: &[u8; 16]) -> Vec<u8> {
    Aes128CbcEnc::new(key.into(), IV.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

fn encrypt_secret(secret: &[u8; 16]) -> String {
    let mut reversed = *secret;
    reversed.reverse();
    let encrypted =
        BigUint::from_bytes_be(&reversed).modpow(&BigUint::from(PUBLIC_EXPONENT), &MODULUS);
    format!("{:0>width$}", encrypted.to_str_radix(16), width = ENC_SEC_KEY_DIGITS)
}
