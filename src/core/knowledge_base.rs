//! Static, read-only reference data about the headers the policy talks about:
//! what each one does, the value we propose, and whether turning it on can
//! break an application.

use crate::core::models::Grade;
use std::fmt;

/// How a header is meant to be treated by a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HeaderKind {
    /// Should be sent.
    Security,
    /// Leaks implementation details and should be removed.
    Unwanted,
    /// Deprecated; should not be sent any more.
    Deprecated,
    /// Not yet widely supported. Reported, never scored.
    Upcoming,
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderKind::Security => write!(f, "Security Headers"),
            HeaderKind::Unwanted => write!(f, "Headers That Should Be Removed"),
            HeaderKind::Deprecated => write!(f, "Deprecated Headers"),
            HeaderKind::Upcoming => write!(f, "Upcoming Headers"),
        }
    }
}

pub struct HeaderDetail {
    pub name: &'static str,
    pub kind: HeaderKind,
    pub description: &'static str,
    /// `None` for headers that should not be sent at all.
    pub recommended_value: Option<&'static str>,
    /// `None` when enabling the header is not known to break anything.
    pub can_break: Option<&'static str>,
    pub safe_to_implement: &'static str,
}

static HEADERS: &[HeaderDetail] = &[
    // --- Security headers ---
    HeaderDetail {
        name: "Strict-Transport-Security",
        kind: HeaderKind::Security,
        description: "Tells browsers to only reach the site over HTTPS for the given period, preventing protocol downgrade attacks and cookie hijacking.",
        recommended_value: Some("max-age=31536000; includeSubDomains"),
        can_break: Some("Can break non-HTTPS environments or development setups"),
        safe_to_implement: "Safe in production with HTTPS",
    },
    HeaderDetail {
        name: "X-Frame-Options",
        kind: HeaderKind::Security,
        description: "Controls whether the page may be rendered inside a frame, protecting visitors against clickjacking.",
        recommended_value: Some("deny"),
        can_break: Some("Can block legitimate iframe usage"),
        safe_to_implement: "Safe if your app doesn't use iframes",
    },
    HeaderDetail {
        name: "X-Content-Type-Options",
        kind: HeaderKind::Security,
        description: "Stops browsers from MIME-sniffing a response away from the declared content type.",
        recommended_value: Some("nosniff"),
        can_break: None,
        safe_to_implement: "Safe for preventing MIME sniffing",
    },
    HeaderDetail {
        name: "Content-Security-Policy",
        kind: HeaderKind::Security,
        description: "Declares which sources the browser may load scripts, styles, frames and other resources from. The main defence against XSS and data injection.",
        recommended_value: Some("default-src 'self'; form-action 'self'; object-src 'none'; frame-ancestors 'none'; upgrade-insecure-requests; block-all-mixed-content"),
        can_break: Some("Can block legitimate inline scripts or external content"),
        safe_to_implement: "Requires careful configuration",
    },
    HeaderDetail {
        name: "X-Permitted-Cross-Domain-Policies",
        kind: HeaderKind::Security,
        description: "Restricts Adobe Flash and PDF clients from loading cross-domain policy files.",
        recommended_value: Some("none"),
        can_break: None,
        safe_to_implement: "Safe, controls cross-domain resource loading",
    },
    HeaderDetail {
        name: "Referrer-Policy",
        kind: HeaderKind::Security,
        description: "Limits how much of the current URL is sent in the Referer header of outgoing requests.",
        recommended_value: Some("no-referrer"),
        can_break: None,
        safe_to_implement: "Safe, controls how much referrer info is shared",
    },
    HeaderDetail {
        name: "Clear-Site-Data",
        kind: HeaderKind::Security,
        description: "Asks the browser to wipe cached data, cookies and storage for the origin.",
        recommended_value: Some("\"cache\",\"cookies\",\"storage\""),
        can_break: Some("Can cause data loss (e.g., cache, cookies)"),
        safe_to_implement: "Needs to be used cautiously (e.g., for logout)",
    },
    HeaderDetail {
        name: "Cross-Origin-Embedder-Policy",
        kind: HeaderKind::Security,
        description: "Prevents the document from loading cross-origin resources that do not explicitly grant permission.",
        recommended_value: Some("require-corp"),
        can_break: Some("May break if not configured correctly"),
        safe_to_implement: "Generally safe, controls embedding of resources",
    },
    HeaderDetail {
        name: "Cross-Origin-Opener-Policy",
        kind: HeaderKind::Security,
        description: "Isolates the browsing context from cross-origin windows it opens or is opened by.",
        recommended_value: Some("same-origin"),
        can_break: Some("May break if not configured correctly"),
        safe_to_implement: "Generally safe, controls opener policy",
    },
    HeaderDetail {
        name: "Cross-Origin-Resource-Policy",
        kind: HeaderKind::Security,
        description: "Declares which origins may include this resource.",
        recommended_value: Some("same-origin"),
        can_break: Some("May break if not configured correctly"),
        safe_to_implement: "Generally safe, controls resource policy",
    },
    HeaderDetail {
        name: "Permissions-Policy",
        kind: HeaderKind::Security,
        description: "Allows or denies browser features such as camera, geolocation or payment for the page and its frames.",
        recommended_value: Some("accelerometer=(), autoplay=(), camera=(), cross-origin-isolated=(), display-capture=(), encrypted-media=(), fullscreen=(), geolocation=(), gyroscope=(), keyboard-map=(), magnetometer=(), microphone=(), midi=(), payment=(), picture-in-picture=(), publickey-credentials-get=(), screen-wake-lock=(), sync-xhr=(self), usb=(), web-share=(), xr-spatial-tracking=(), clipboard-read=(), clipboard-write=(), gamepad=(), hid=(), idle-detection=(), interest-cohort=(), serial=(), unload=()"),
        can_break: Some("Can interfere with feature access (e.g., geolocation)"),
        safe_to_implement: "Safe if configured according to app requirements",
    },
    HeaderDetail {
        name: "Cache-Control",
        kind: HeaderKind::Security,
        description: "Controls whether responses may be stored by browsers and intermediate caches.",
        recommended_value: Some("no-store, max-age=0"),
        can_break: None,
        safe_to_implement: "Safe, controls caching behavior",
    },
    // --- Deprecated ---
    HeaderDetail {
        name: "X-XSS-Protection",
        kind: HeaderKind::Deprecated,
        description: "Legacy switch for the browser XSS auditor. Modern browsers ignore it and some of its modes introduced vulnerabilities.",
        recommended_value: None,
        can_break: None,
        safe_to_implement: "Safe to remove; use Content-Security-Policy instead",
    },
    // --- Unwanted ---
    HeaderDetail {
        name: "Server",
        kind: HeaderKind::Unwanted,
        description: "Advertises the web server software and often its version.",
        recommended_value: None,
        can_break: None,
        safe_to_implement: "Safe to remove or reduce to a generic value",
    },
    HeaderDetail {
        name: "X-Powered-By",
        kind: HeaderKind::Unwanted,
        description: "Advertises the application framework or language runtime.",
        recommended_value: None,
        can_break: None,
        safe_to_implement: "Safe to remove",
    },
    HeaderDetail {
        name: "X-AspNet-Version",
        kind: HeaderKind::Unwanted,
        description: "Advertises the exact ASP.NET version.",
        recommended_value: None,
        can_break: None,
        safe_to_implement: "Safe to remove",
    },
    HeaderDetail {
        name: "X-AspNetMvc-Version",
        kind: HeaderKind::Unwanted,
        description: "Advertises the exact ASP.NET MVC version.",
        recommended_value: None,
        can_break: None,
        safe_to_implement: "Safe to remove",
    },
    // --- Upcoming ---
    HeaderDetail {
        name: "Origin-Agent-Cluster",
        kind: HeaderKind::Upcoming,
        description: "Requests that the document be placed in an origin-keyed agent cluster.",
        recommended_value: Some("?1"),
        can_break: Some("Breaks pages that rely on setting document.domain"),
        safe_to_implement: "Generally safe",
    },
    HeaderDetail {
        name: "Reporting-Endpoints",
        kind: HeaderKind::Upcoming,
        description: "Names the endpoints browsers should deliver CSP and other reports to.",
        recommended_value: None,
        can_break: None,
        safe_to_implement: "Safe, only affects report delivery",
    },
];

/// Case-insensitive lookup of a header.
pub fn get_header_detail(name: &str) -> Option<&'static HeaderDetail> {
    HEADERS.iter().find(|h| h.name.eq_ignore_ascii_case(name.trim()))
}

/// The proposed configuration: every security header with its recommended value.
pub fn configuration_proposal() -> impl Iterator<Item = (&'static str, &'static str)> {
    HEADERS
        .iter()
        .filter(|h| h.kind == HeaderKind::Security)
        .filter_map(|h| h.recommended_value.map(|v| (h.name, v)))
}

pub fn all_headers() -> &'static [HeaderDetail] {
    HEADERS
}

/// One-line verdict on a grade.
pub fn interpret_grade(grade: Grade) -> &'static str {
    match grade {
        Grade::APlus => "Excellent! Your site has top-notch security headers.",
        Grade::A | Grade::AMinus => {
            "Very good. Your site has strong security headers, with minor room for improvement."
        }
        Grade::BPlus | Grade::B | Grade::BMinus => {
            "Good, but there's room for improvement in your security headers."
        }
        Grade::CPlus | Grade::C | Grade::CMinus => {
            "Fair. Several important security headers are missing or misconfigured."
        }
        Grade::DPlus | Grade::D | Grade::DMinus => {
            "Poor. Many critical security headers are missing. Immediate attention is required."
        }
        Grade::E | Grade::F => "Critical. Your site is missing most or all important security headers.",
        Grade::NotAvailable => "No grade could be computed for this scan.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy::Policy;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let detail = get_header_detail("strict-transport-security").unwrap();
        assert_eq!(detail.name, "Strict-Transport-Security");
        assert!(get_header_detail("X-Not-A-Header").is_none());
    }

    #[test]
    fn test_every_shipped_policy_header_is_documented() {
        let policy = Policy::from_toml(include_str!("../../headers_config.toml")).unwrap();
        for rule in policy.required().iter().chain(policy.unwanted()).chain(policy.upcoming()) {
            assert!(get_header_detail(&rule.name).is_some(), "{} is undocumented", rule.name);
        }
    }

    #[test]
    fn test_proposal_covers_security_headers_only() {
        let proposal: Vec<_> = configuration_proposal().collect();
        assert_eq!(proposal.len(), 12);
        assert!(proposal.iter().all(|(name, _)| *name != "Server"));
        assert!(proposal.contains(&("X-Content-Type-Options", "nosniff")));
    }

    #[test]
    fn test_interpret_grade() {
        assert!(interpret_grade(Grade::APlus).starts_with("Excellent"));
        assert!(interpret_grade(Grade::BMinus).starts_with("Good"));
        assert!(interpret_grade(Grade::F).starts_with("Critical"));
    }
}
