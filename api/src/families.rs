/*++

Licensed under the Apache-2.0 license.

File Name:

    families.rs

Abstract:

    Service families a client can enable when building its dispatch table.

--*/

bitflags::bitflags! {
    #[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct ServiceFamilies : u32 {
        // Session open/close and shared buffer negotiation
        const SESSION = 1 << 0;
        const KEY_STORE = 1 << 1;
        // Key management service and the key operations run on it
        const KEY_MANAGEMENT = 1 << 2;
        const MAC = 1 << 3;
        const CIPHER = 1 << 4;
        const HASH = 1 << 5;
        const SIGN_GEN = 1 << 6;
        const VERIFY_SIGN = 1 << 7;
        const RNG = 1 << 8;
        const SHE = 1 << 9;
    }
}

impl ServiceFamilies {
    /// Families every session needs to bootstrap itself.
    pub const REQUIRED: Self = Self::SESSION.union(Self::KEY_STORE);

    /// Parse a family name as written in configuration files.
    ///
    /// Names are the constant names, matched case-insensitively.
    pub fn from_config_name(name: &str) -> Option<Self> {
        Self::from_name(&name.to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_name() {
        assert_eq!(
            ServiceFamilies::from_config_name("mac"),
            Some(ServiceFamilies::MAC)
        );
        assert_eq!(
            ServiceFamilies::from_config_name("Sign_Gen"),
            Some(ServiceFamilies::SIGN_GEN)
        );
        assert_eq!(ServiceFamilies::from_config_name("tls"), None);
    }

    #[test]
    fn test_required() {
        assert!(ServiceFamilies::REQUIRED.contains(ServiceFamilies::SESSION));
        assert!(ServiceFamilies::REQUIRED.contains(ServiceFamilies::KEY_STORE));
        assert!(!ServiceFamilies::REQUIRED.contains(ServiceFamilies::MAC));
    }
}
