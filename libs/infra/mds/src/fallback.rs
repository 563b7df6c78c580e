/// Phase-1 static fallback table: well-known AAGUIDs mapped to a display
/// name, assumed hardware-backed, used only when the live MDS cache has
/// never resolved (or does not cover) a given AAGUID.
const FALLBACK_TABLE: &[(&str, &str)] = &[
    ("fbfc3007-154e-4ecc-8c0b-6e020557d7bd", "iCloud Keychain (Secure Enclave)"),
    ("08987058-cadc-4b81-b6e1-30de50dcbe96", "Windows Hello"),
    ("adce0002-35bc-c60a-648b-0b25f1f05503", "Chrome Touch ID"),
    ("ea9b8d66-4d01-1d21-3ce4-b6b48cb575d4", "Google Password Manager"),
];

pub fn lookup(aaguid: &str) -> Option<&'static str> {
    let aaguid = aaguid.to_lowercase();
    FALLBACK_TABLE
        .iter()
        .find(|(known, _)| *known == aaguid)
        .map(|(_, name)| *name)
}
