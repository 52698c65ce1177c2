//! Confirmation mail template.

use crate::sender::MailMessage;

/// Characters of the fingerprint shown in the subject line.
const SUBJECT_FINGERPRINT_CHARS: usize = 16;

const CONFIRMATION_TEMPLATE: &str = r#"
<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
	<h2>Welcome to {service}!</h2>
	<p>Thank you for registering. You are confirming a key with fingerprint:</p>
	<div style="background-color: #f5f5f5; padding: 15px; border-radius: 5px; margin: 20px 0;">
		<p style="font-family: monospace; font-size: 16px; margin: 0;">{fingerprint}</p>
	</div>
	<p>To complete your registration, please use the confirmation code below:</p>
	<div style="background-color: #f5f5f5; padding: 15px; border-radius: 5px; margin: 20px 0;">
		<p style="font-size: 18px; margin: 0;">Your confirmation code: <strong>{code}</strong></p>
	</div>
	<p>Run the following command:</p>
	<pre style="background-color: #f5f5f5; padding: 15px; border-radius: 5px; overflow-x: auto;">ssh {service} confirm {code}</pre>
	<p style="color: #666; margin-top: 20px; font-size: 14px;">
		If you didn't request this registration, please ignore this email.
	</p>
</div>
"#;

/// Render the confirmation message for a pending registration.
pub fn confirmation(service: &str, to: &str, code: &str, fingerprint: &str) -> MailMessage {
    let short: String = fingerprint.chars().take(SUBJECT_FINGERPRINT_CHARS).collect();

    let html = CONFIRMATION_TEMPLATE
        .replace("{service}", &escape_html(service))
        .replace("{fingerprint}", &escape_html(fingerprint))
        .replace("{code}", &escape_html(code));

    MailMessage {
        to: vec![to.to_string()],
        subject: format!("Complete {service} Registration for Key {short}..."),
        html,
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_contains_code_and_command() {
        let msg = confirmation(
            "keyward.example",
            "alice@example.com",
            "aB3xY9",
            "SHA256:uNiVztksCsDhcc0u9e8BujQXVUpKZIDTMczCvj3tD2s",
        );

        assert_eq!(msg.to, vec!["alice@example.com".to_string()]);
        assert_eq!(
            msg.subject,
            "Complete keyward.example Registration for Key SHA256:uNiVztksC..."
        );
        assert!(msg.html.contains("<strong>aB3xY9</strong>"));
        assert!(msg.html.contains("ssh keyward.example confirm aB3xY9"));
        assert!(msg
            .html
            .contains("SHA256:uNiVztksCsDhcc0u9e8BujQXVUpKZIDTMczCvj3tD2s"));
    }

    #[test]
    fn test_values_are_escaped() {
        let msg = confirmation("svc", "a@b.co", "<b>", "SHA256:x&y");

        assert!(msg.html.contains("&lt;b&gt;"));
        assert!(msg.html.contains("SHA256:x&amp;y"));
        assert!(!msg.html.contains("<b>"));
    }
}
