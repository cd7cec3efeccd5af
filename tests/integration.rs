#[cfg(unix)]
mod integration {
    mod common;
    mod config;
    mod encrypt_decrypt;
    mod keys;
    mod show;
    mod sign_verify;
}
