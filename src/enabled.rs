// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

#[cfg(feature = "aes")]
mod aes;

#[cfg(any(feature = "aes", feature = "des"))]
mod blockcipher;

#[cfg(any(feature = "aes", feature = "des"))]
mod cbcmac;

#[cfg(any(feature = "aes", feature = "des"))]
mod cmac;

#[cfg(feature = "des")]
mod des;

#[cfg(feature = "ecc")]
mod ec;

#[cfg(feature = "ffdh")]
mod ffdh;

#[cfg(feature = "hash")]
mod hash;

#[cfg(feature = "hmac")]
mod hmac;

#[cfg(feature = "rsa")]
mod padding;

#[cfg(feature = "rsa")]
mod rsa;

mod secret;

fn register_all(mechs: &mut Mechanisms) {
    secret::register(mechs);

    #[cfg(feature = "aes")]
    aes::register(mechs);

    #[cfg(any(feature = "aes", feature = "des"))]
    cbcmac::register(mechs);

    #[cfg(any(feature = "aes", feature = "des"))]
    cmac::register(mechs);

    #[cfg(feature = "des")]
    des::register(mechs);

    #[cfg(feature = "ecc")]
    ec::register(mechs);

    #[cfg(feature = "ffdh")]
    ffdh::register(mechs);

    #[cfg(feature = "hash")]
    hash::register(mechs);

    #[cfg(feature = "hmac")]
    hmac::register(mechs);

    #[cfg(feature = "rsa")]
    rsa::register(mechs);
}
