use woothee::parser::Parser;

use crate::domain::DeviceType;

/// Browser and device facts derived from a User-Agent string.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedUserAgent {
    pub browser_name: String,
    pub browser_version: String,
    /// Operating system name ("Windows 10", "iPhone"). woothee reports no
    /// hardware model, so this is the closest device detail available.
    pub device_model: String,
    pub device_type: DeviceType,
    pub is_bot: bool,
}

const UNKNOWN: &str = "UNKNOWN";

fn known(value: &str) -> String {
    if value == UNKNOWN {
        String::new()
    } else {
        value.to_string()
    }
}

pub fn parse_user_agent(user_agent: &str) -> ParsedUserAgent {
    let parser = Parser::new();

    match parser.parse(user_agent) {
        Some(result) => {
            let name = result.name.to_lowercase();
            let is_bot = result.category == "crawler"
                || name.contains("bot")
                || name.contains("spider");

            let device_type = if is_bot {
                DeviceType::Robot
            } else {
                match result.category {
                    "smartphone" | "mobilephone" => DeviceType::Phone,
                    "tablet" => DeviceType::Tablet,
                    "pc" => DeviceType::Desktop,
                    _ => DeviceType::Other,
                }
            };

            ParsedUserAgent {
                browser_name: known(result.name),
                browser_version: known(&result.version),
                device_model: known(result.os),
                device_type,
                is_bot,
            }
        }
        None => ParsedUserAgent::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chrome_desktop() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
        let parsed = parse_user_agent(ua);
        assert_eq!(parsed.browser_name, "Chrome");
        assert_eq!(parsed.browser_version, "91.0.4472.124");
        assert_eq!(parsed.device_model, "Windows 10");
        assert_eq!(parsed.device_type, DeviceType::Desktop);
        assert!(!parsed.is_bot);
    }

    #[test]
    fn test_parse_firefox() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0";
        let parsed = parse_user_agent(ua);
        assert_eq!(parsed.browser_name, "Firefox");
        assert_eq!(parsed.browser_version, "89.0");
        assert_eq!(parsed.device_type, DeviceType::Desktop);
    }

    #[test]
    fn test_parse_iphone() {
        let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Mobile/15E148 Safari/604.1";
        let parsed = parse_user_agent(ua);
        assert_eq!(parsed.device_type, DeviceType::Phone);
        assert_eq!(parsed.device_model, "iPhone");
        assert!(!parsed.is_bot);
    }

    #[test]
    fn test_parse_android() {
        let ua = "Mozilla/5.0 (Linux; Android 11; SM-G991B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.120 Mobile Safari/537.36";
        let parsed = parse_user_agent(ua);
        assert_eq!(parsed.device_type, DeviceType::Phone);
        assert!(!parsed.is_bot);
    }

    #[test]
    fn test_parse_googlebot() {
        let ua = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
        let parsed = parse_user_agent(ua);
        assert!(parsed.is_bot);
        assert_eq!(parsed.device_type, DeviceType::Robot);
    }

    #[test]
    fn test_parse_bingbot() {
        let ua = "Mozilla/5.0 (compatible; bingbot/2.0; +http://www.bing.com/bingbot.htm)";
        let parsed = parse_user_agent(ua);
        assert!(parsed.is_bot);
    }

    #[test]
    fn test_parse_empty_ua() {
        let parsed = parse_user_agent("");
        assert_eq!(parsed, ParsedUserAgent::default());
        assert_eq!(parsed.device_type, DeviceType::Other);
    }

    #[test]
    fn test_unknown_fields_become_empty() {
        let parsed = parse_user_agent("SomeUnknownApp/1.0");
        assert_ne!(parsed.browser_name, UNKNOWN);
        assert_ne!(parsed.browser_version, UNKNOWN);
        assert_ne!(parsed.device_model, UNKNOWN);
    }
}
