//! MediSecure API paths, relative to the API base URL.
//!
//! Identifiers are percent-encoded so they always stay a single path segment.

/// Authentication endpoints.
pub mod auth {
    pub const LOGIN: &str = "/auth/login";
    pub const LOGOUT: &str = "/auth/logout";
    pub const RESET_PASSWORD: &str = "/auth/reset-password";
}

/// Patient endpoints.
pub mod patients {
    use super::encode_segment;

    pub const BASE: &str = "/patients";
    pub const SEARCH: &str = "/patients/search";

    pub fn detail(id: &str) -> String {
        format!("{}/{}", BASE, encode_segment(id))
    }
}

/// Appointment endpoints.
pub mod appointments {
    use super::encode_segment;

    pub const BASE: &str = "/appointments";
    pub const CALENDAR: &str = "/appointments/calendar";

    pub fn detail(id: &str) -> String {
        format!("{}/{}", BASE, encode_segment(id))
    }

    pub fn by_patient(patient_id: &str) -> String {
        format!("{}/patient/{}", BASE, encode_segment(patient_id))
    }

    pub fn by_doctor(doctor_id: &str) -> String {
        format!("{}/doctor/{}", BASE, encode_segment(doctor_id))
    }
}

/// Medical record endpoints.
pub mod medical_records {
    use super::encode_segment;

    pub const BASE: &str = "/medical-records";

    pub fn detail(id: &str) -> String {
        format!("{}/{}", BASE, encode_segment(id))
    }

    pub fn documents(record_id: &str) -> String {
        format!("{}/{}/documents", BASE, encode_segment(record_id))
    }

    pub fn document(record_id: &str, document_id: &str) -> String {
        format!(
            "{}/{}/documents/{}",
            BASE,
            encode_segment(record_id),
            encode_segment(document_id)
        )
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn encode_segment(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}
