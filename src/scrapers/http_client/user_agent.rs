//! User-agent rotation and browser-shaped request headers.

use rand::Rng;

/// Desktop browser user agents (Chrome, Firefox, Safari, Edge; current
/// as of mid 2026).
pub const DESKTOP_USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36",
    // Chrome on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:141.0) Gecko/20100101 Firefox/141.0",
    // Firefox on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:141.0) Gecko/20100101 Firefox/141.0",
    // Safari on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.5 Safari/605.1.15",
    // Edge on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36 Edg/138.0.0.0",
];

/// Mobile browser user agents.
pub const MOBILE_USER_AGENTS: &[&str] = &[
    // Chrome on Android
    "Mozilla/5.0 (Linux; Android 15; Pixel 9) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Mobile Safari/537.36",
    // Safari on iPhone
    "Mozilla/5.0 (iPhone; CPU iPhone OS 18_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.5 Mobile/15E148 Safari/604.1",
    // Firefox on Android
    "Mozilla/5.0 (Android 15; Mobile; rv:141.0) Gecko/141.0 Firefox/141.0",
];

/// Which pool a fetch draws its user agent from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UserAgentClass {
    #[default]
    Desktop,
    Mobile,
    /// Draw from both pools, weighted by pool size.
    Any,
}

/// Pick a random user agent for one attempt.
pub fn random_user_agent(class: UserAgentClass) -> &'static str {
    let mut rng = rand::rng();
    match class {
        UserAgentClass::Desktop => {
            DESKTOP_USER_AGENTS[rng.random_range(0..DESKTOP_USER_AGENTS.len())]
        }
        UserAgentClass::Mobile => MOBILE_USER_AGENTS[rng.random_range(0..MOBILE_USER_AGENTS.len())],
        UserAgentClass::Any => {
            let total = DESKTOP_USER_AGENTS.len() + MOBILE_USER_AGENTS.len();
            let idx = rng.random_range(0..total);
            if idx < DESKTOP_USER_AGENTS.len() {
                DESKTOP_USER_AGENTS[idx]
            } else {
                MOBILE_USER_AGENTS[idx - DESKTOP_USER_AGENTS.len()]
            }
        }
    }
}

/// Browser-shaped headers for a given user agent. Chrome- and Edge-shaped
/// agents get a minimal `Sec-Ch-Ua*` set.
pub fn browser_headers(user_agent: &str) -> Vec<(&'static str, String)> {
    let mut headers: Vec<(&'static str, String)> = vec![
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        ),
        ("Accept-Language", "en-US,en;q=0.9".to_string()),
        ("Accept-Encoding", "gzip, deflate, br".to_string()),
        ("Connection", "keep-alive".to_string()),
        ("Upgrade-Insecure-Requests", "1".to_string()),
    ];

    if user_agent.contains("Chrome/") {
        let brand = if user_agent.contains("Edg/") {
            "\"Microsoft Edge\";v=\"138\", \"Chromium\";v=\"138\", \"Not=A?Brand\";v=\"24\""
        } else {
            "\"Google Chrome\";v=\"138\", \"Chromium\";v=\"138\", \"Not=A?Brand\";v=\"24\""
        };
        let mobile = user_agent.contains("Mobile");
        headers.push(("Sec-Ch-Ua", brand.to_string()));
        headers.push(("Sec-Ch-Ua-Mobile", if mobile { "?1" } else { "?0" }.to_string()));
        headers.push((
            "Sec-Ch-Ua-Platform",
            if user_agent.contains("Windows") {
                "\"Windows\""
            } else if user_agent.contains("Android") {
                "\"Android\""
            } else {
                "\"macOS\""
            }
            .to_string(),
        ));
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pools_draw_from_right_set() {
        for _ in 0..20 {
            assert!(DESKTOP_USER_AGENTS.contains(&random_user_agent(UserAgentClass::Desktop)));
            assert!(MOBILE_USER_AGENTS.contains(&random_user_agent(UserAgentClass::Mobile)));
        }
    }

    #[test]
    fn test_any_draws_from_both() {
        let ua = random_user_agent(UserAgentClass::Any);
        assert!(DESKTOP_USER_AGENTS.contains(&ua) || MOBILE_USER_AGENTS.contains(&ua));
    }

    #[test]
    fn test_chrome_gets_client_hints() {
        let headers = browser_headers(DESKTOP_USER_AGENTS[0]);
        assert!(headers.iter().any(|(k, _)| *k == "Sec-Ch-Ua"));
        assert!(headers.iter().any(|(k, _)| *k == "Upgrade-Insecure-Requests"));
    }

    #[test]
    fn test_firefox_gets_no_client_hints() {
        let firefox = DESKTOP_USER_AGENTS
            .iter()
            .find(|ua| ua.contains("Firefox"))
            .unwrap();
        let headers = browser_headers(firefox);
        assert!(!headers.iter().any(|(k, _)| *k == "Sec-Ch-Ua"));
        assert!(headers.iter().any(|(k, _)| *k == "Accept"));
    }

    #[test]
    fn test_edge_brand() {
        let edge = DESKTOP_USER_AGENTS
            .iter()
            .find(|ua| ua.contains("Edg/"))
            .unwrap();
        let headers = browser_headers(edge);
        let sec_ch = headers.iter().find(|(k, _)| *k == "Sec-Ch-Ua").unwrap();
        assert!(sec_ch.1.contains("Microsoft Edge"));
    }
}
