// Licensed under the Apache-2.0 license

mod common;
mod test_cipher;
mod test_faults;
mod test_hash;
mod test_key_mgmt;
mod test_mac;
mod test_session;
mod test_she;
mod test_sign;
