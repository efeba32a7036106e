use regex::Regex;

const EMAIL_PATTERN: &str = r"\b([A-Za-z0-9._+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,6})\b";

/// ITU country calling codes, longest alternatives first
const COUNTRY_CODES: &str = "9[976]\\d|8[987530]\\d|6[987]\\d|5[90]\\d|42\\d|3[875]\\d|\
2[98654321]\\d|9[8543210]|8[6421]|6[6543210]|5[87654321]|4[987654310]|3[9643210]|2[70]|7|1";

/// Pulls email addresses and phone numbers out of page text
#[derive(Debug, Clone)]
pub struct TextMiner {
    email: Regex,
    phone: Regex,
    phone_context: Regex,
    noise: Regex,
    pipes: Regex,
    min_phone_len: usize,
}

impl TextMiner {
    /// # Arguments
    ///
    /// * `min_phone_len` - Shortest accepted phone, `+` included
    pub fn new(min_phone_len: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            email: Regex::new(EMAIL_PATTERN)?,
            phone: Regex::new(&format!(r"(\D|^)(\+({})\d{{1,14}})(\D|$)", COUNTRY_CODES))?,
            phone_context: Regex::new(&format!(
                r"(?i)(tel|phone|phone.?number|mobile|mob)\D{{0,3}}(({})\d{{1,14}})(\D|$)",
                COUNTRY_CODES
            ))?,
            noise: Regex::new(r"\s+|-|\(|\)|24/7")?,
            pipes: Regex::new(r"\|+")?,
            min_phone_len,
        })
    }

    /// Distinct lowercase emails, in order of first appearance
    pub fn find_emails(&self, text: &str) -> Vec<String> {
        let mut emails = Vec::new();
        self.collect_emails(text, &mut emails);
        emails
    }

    /// Distinct phones, in order of first appearance
    ///
    /// Explicit international numbers come first, then numbers found after a
    /// `tel`/`phone`/`mobile` label (given a leading `+`).
    pub fn find_phones(&self, text: &str) -> Vec<String> {
        let mut phones = Vec::new();
        self.collect_phones(text, &mut phones);
        phones
    }

    /// Adds emails from `text` not already in `emails`
    pub fn collect_emails(&self, text: &str, emails: &mut Vec<String>) {
        for caps in self.email.captures_iter(text) {
            let email = caps[1].to_lowercase();
            if !emails.contains(&email) {
                emails.push(email);
            }
        }
    }

    /// Adds phones from `text` not already in `phones`
    pub fn collect_phones(&self, text: &str, phones: &mut Vec<String>) {
        let cleaned = self.noise.replace_all(text, "");
        let cleaned = self.pipes.replace_all(&cleaned, "|");

        for caps in self.phone.captures_iter(&cleaned) {
            self.accept_phone(caps[2].to_string(), phones);
        }
        for caps in self.phone_context.captures_iter(&cleaned) {
            self.accept_phone(format!("+{}", &caps[2]), phones);
        }
    }

    fn accept_phone(&self, phone: String, phones: &mut Vec<String>) {
        if phone.len() >= self.min_phone_len && !phones.contains(&phone) {
            phones.push(phone);
        }
    }
}
