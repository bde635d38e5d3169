//! Shared fixtures for integration tests

#![allow(dead_code)]

use phisher_cop::config::Config;
use std::fs;
use std::path::Path;

const LEGITIMATE_SUBJECTS: &[&str] = &[
    "Quarterly planning meeting",
    "Lunch on Friday",
    "Notes from the design review",
    "Invoice for March attached",
    "Team offsite agenda",
];

const LEGITIMATE_BODIES: &[&str] = &[
    "Hi team,\n\nThe agenda for the planning meeting is in the shared folder: https://docs.google.com/document/d/abc{i}\nPlease add your topics before Thursday.\n\nThanks,\nAlice",
    "Hey,\n\nAre we still on for lunch on Friday? The new place near the office has good reviews.\n\nCheers,\nBob",
    "Hello,\n\nAttached are my notes from yesterday's review. The release schedule looks fine and the remaining questions are in the tracker at https://github.com/example/project/issues/{i}\n\nRegards,\nCarol",
    "Dear customer,\n\nThank you for your order. Your invoice number {i} is available in your account history.\n\nKind regards,\nThe billing team",
    "Hi all,\n\nThe offsite starts at nine. Coffee and breakfast will be served in the lobby.\n\nSee you there,\nDave",
];

const PHISHING_SUBJECTS: &[&str] = &[
    "URGENT: Your account has been suspended",
    "Action required: verify your password",
    "Security alert on your PayPal account",
    "Final notice: confirm your banking details",
    "Your mailbox is full, verify now",
];

const PHISHING_BODIES: &[&str] = &[
    "Dear user,\n\nWe detected unusual activity. Your account will be suspended within 24 hours unless you verify your identity immediately at http://192.168.{a}.{b}/login\n\nSecurity Department",
    "URGENT!!! Your password expires today. Click here to confirm your credentials: http://10.0.{a}.{b}/verify.php\nFailure to act immediately will result in permanent account closure.",
    "Dear PayPal customer,\n\nYour payment of $499 was declined. Verify your billing information urgently at http://172.16.{a}.{b}/paypal/secure or your account will be locked.",
    "FINAL NOTICE\n\nConfirm your bank account and social security number now to avoid suspension: http://203.0.{a}.{b}/bank/update\nAct immediately.",
    "Your mailbox quota is exceeded. Verify your login credentials immediately at http://198.51.{a}.{b}/webmail to restore access. Unverified accounts will be deleted.",
];

/// Raw text of the `i`-th synthetic legitimate message
pub fn legitimate_message(i: usize) -> String {
    let k = i % LEGITIMATE_BODIES.len();
    format!(
        "From: Colleague {i} <colleague{i}@example.com>\r\nTo: me@example.com\r\nSubject: {}\r\nDate: Mon, 1 Apr 2024 10:00:00 +0000\r\nMessage-ID: <ham{i}@example.com>\r\n\r\n{}\r\nref zqham{i}\r\n",
        LEGITIMATE_SUBJECTS[k],
        LEGITIMATE_BODIES[k].replace("{i}", &i.to_string()),
        i = i
    )
}

/// Raw text of the `i`-th synthetic phishing message
pub fn phishing_message(i: usize) -> String {
    let k = i % PHISHING_BODIES.len();
    let body = PHISHING_BODIES[k]
        .replace("{a}", &(i % 200).to_string())
        .replace("{b}", &(i % 250 + 1).to_string());
    format!(
        "From: \"PayPal Security\" <support{i}@secure-paypa1-login.net>\r\nReply-To: collect{i}@mailbox-verify.ru\r\nTo: me@example.com\r\nSubject: {}\r\n\r\n{}\r\nref zqspam{i}\r\n",
        PHISHING_SUBJECTS[k],
        body,
        i = i
    )
}

/// Write `n` messages per class into `ham/` and `spam/` under `root`
pub fn write_corpus(root: &Path, n: usize) {
    let ham = root.join("ham");
    let spam = root.join("spam");
    fs::create_dir_all(&ham).unwrap();
    fs::create_dir_all(&spam).unwrap();
    for i in 0..n {
        fs::write(ham.join(format!("{:04}.eml", i)), legitimate_message(i)).unwrap();
        fs::write(spam.join(format!("{:04}.eml", i)), phishing_message(i)).unwrap();
    }
}

/// Default configuration writing artifacts to `output`, with a smaller forest
pub fn test_config(output: &Path) -> Config {
    let mut config = Config::default();
    config.training.output_dir = output.to_string_lossy().to_string();
    config.model.forest.n_trees = 15;
    config
}
