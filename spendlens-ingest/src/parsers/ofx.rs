//! OFX statement parser (text)
//!
//! Handles both OFX 1.x SGML exports, where leaf elements have no closing
//! tag, and OFX 2.x XML exports:
//!
//!   <STMTTRN>
//!     <TRNTYPE>DEBIT
//!     <DTPOSTED>20240301120000[-3:BRT]
//!     <TRNAMT>-50.00
//!     <FITID>202403010001
//!     <MEMO>SUPERMARKET XYZ
//!   </STMTTRN>

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use regex::Regex;

use crate::types::{StatementKind, StatementTransaction};

#[derive(Debug, Default)]
struct TxnFields {
    index: usize,
    fitid: Option<String>,
    dtposted: Option<String>,
    trnamt: Option<String>,
    memo: Option<String>,
    name: Option<String>,
    trntype: Option<String>,
}

impl TxnFields {
    fn finish(self, account_id: Option<&str>, kind: StatementKind) -> Result<StatementTransaction> {
        let index = self.index;
        let id = self
            .fitid
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("STMTTRN #{index}: missing FITID"))?;
        let raw_date = self
            .dtposted
            .ok_or_else(|| anyhow!("STMTTRN #{index} ({id}): missing DTPOSTED"))?;
        let raw_amount = self
            .trnamt
            .ok_or_else(|| anyhow!("STMTTRN #{index} ({id}): missing TRNAMT"))?;

        let date = parse_ofx_date(&raw_date)
            .with_context(|| format!("STMTTRN #{index} ({id}): bad DTPOSTED"))?;
        let amount = parse_ofx_amount(&raw_amount)
            .with_context(|| format!("STMTTRN #{index} ({id}): bad TRNAMT"))?;

        let description = self
            .memo
            .filter(|s| !s.trim().is_empty())
            .or(self.name)
            .unwrap_or_default();

        Ok(StatementTransaction {
            id,
            date,
            amount,
            description,
            trn_type: self.trntype,
            account_id: account_id.map(str::to_string),
            kind,
        })
    }
}

/// `YYYYMMDD[HHMMSS[.XXX]][[offset:TZ]]` → date part only.
///
/// The `[offset:TZ]` suffix is ignored: the result is the bank's local posting
/// date, not a UTC conversion. `20231231220000[-3:BRT]` stays on 2023-12-31, so
/// the date floor sees the day printed on the statement.
pub fn parse_ofx_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    if s.len() < 8 || !s.as_bytes()[..8].iter().all(u8::is_ascii_digit) {
        bail!("expected YYYYMMDD prefix, got {s:?}");
    }
    Ok(NaiveDate::parse_from_str(&s[..8], "%Y%m%d")?)
}

/// Accepts `-50.00`, `+1234.5`, comma-decimal `-50,00`, and grouped
/// `1,234.56` / `-1.234,56`. When both separators appear, the last one is the
/// decimal point.
pub fn parse_ofx_amount(s: &str) -> Result<f64> {
    let s = s.trim().trim_start_matches('+');
    let normalized = match (s.rfind('.'), s.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (None, Some(_)) => s.replace(',', "."),
        _ => s.to_string(),
    };
    normalized
        .parse::<f64>()
        .map_err(|e| anyhow!("invalid amount {s:?}: {e}"))
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Parse OFX text into transactions, in document order.
pub fn parse_ofx_text(text: &str) -> Result<Vec<StatementTransaction>> {
    let tag_re = Regex::new(r"<(?P<close>/)?(?P<tag>[A-Za-z0-9.]+)>(?P<text>[^<]*)")?;

    let mut saw_root = false;
    let mut kind = StatementKind::BankAccount;
    let mut account_id: Option<String> = None;
    let mut current: Option<TxnFields> = None;
    let mut seen = 0usize;
    let mut out = Vec::new();

    for caps in tag_re.captures_iter(text) {
        let tag = caps["tag"].to_ascii_uppercase();
        let closing = caps.name("close").is_some();
        let value = decode_entities(caps["text"].trim());

        if closing {
            if tag == "STMTTRN" {
                if let Some(fields) = current.take() {
                    out.push(fields.finish(account_id.as_deref(), kind)?);
                }
            }
            continue;
        }

        match tag.as_str() {
            "OFX" => saw_root = true,
            "BANKACCTFROM" => {
                kind = StatementKind::BankAccount;
                account_id = None;
            }
            "CCACCTFROM" => {
                kind = StatementKind::CreditCard;
                account_id = None;
            }
            "STMTTRN" => {
                // SGML exports sometimes omit </STMTTRN>
                if let Some(fields) = current.take() {
                    out.push(fields.finish(account_id.as_deref(), kind)?);
                }
                seen += 1;
                current = Some(TxnFields {
                    index: seen,
                    ..Default::default()
                });
            }
            _ => {}
        }

        if value.is_empty() {
            continue;
        }

        match current.as_mut() {
            Some(fields) => match tag.as_str() {
                "FITID" => fields.fitid = Some(value),
                "DTPOSTED" => fields.dtposted = Some(value),
                "TRNAMT" => fields.trnamt = Some(value),
                "MEMO" => fields.memo = Some(value),
                "NAME" => fields.name = Some(value),
                "TRNTYPE" => fields.trntype = Some(value),
                _ => {}
            },
            None => {
                if tag == "ACCTID" {
                    account_id = Some(value);
                }
            }
        }
    }

    if !saw_root {
        bail!("not an OFX document (no <OFX> element)");
    }

    if let Some(fields) = current.take() {
        out.push(fields.finish(account_id.as_deref(), kind)?);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SGML: &str = r#"OFXHEADER:100
DATA:OFXSGML
VERSION:102
ENCODING:USASCII
CHARSET:1252

<OFX>
<BANKMSGSRSV1><STMTTRNRS><STMTRS>
<CURDEF>BRL
<BANKACCTFROM>
<BANKID>0341
<ACCTID>12345-6
<ACCTTYPE>CHECKING
</BANKACCTFROM>
<BANKTRANLIST>
<DTSTART>20240301
<DTEND>20240331
<STMTTRN>
<TRNTYPE>DEBIT
<DTPOSTED>20240301120000[-3:BRT]
<TRNAMT>-50,00
<FITID>202403010001
<MEMO>SUPERMARKET XYZ
</STMTTRN>
<STMTTRN>
<TRNTYPE>CREDIT
<DTPOSTED>20240305
<TRNAMT>2500.00
<FITID>202403050001
<NAME>ACME PAYROLL
</STMTTRN>
</BANKTRANLIST>
</STMTRS></STMTTRNRS></BANKMSGSRSV1>
</OFX>
"#;

    #[test]
    fn test_parses_sgml_rows() {
        let txns = parse_ofx_text(SGML).unwrap();
        assert_eq!(txns.len(), 2);

        assert_eq!(txns[0].id, "202403010001");
        assert_eq!(txns[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(txns[0].amount, -50.0);
        assert_eq!(txns[0].description, "SUPERMARKET XYZ");
        assert_eq!(txns[0].trn_type.as_deref(), Some("DEBIT"));
        assert_eq!(txns[0].account_id.as_deref(), Some("12345-6"));
        assert_eq!(txns[0].kind, StatementKind::BankAccount);

        // No MEMO: falls back to NAME
        assert_eq!(txns[1].description, "ACME PAYROLL");
        assert_eq!(txns[1].amount, 2500.0);
    }

    #[test]
    fn test_parses_xml_credit_card() {
        let text = r#"<?xml version="1.0" encoding="UTF-8"?>
<OFX><CREDITCARDMSGSRSV1><CCSTMTTRNRS><CCSTMTRS>
<CCACCTFROM><ACCTID>4111</ACCTID></CCACCTFROM>
<BANKTRANLIST>
<STMTTRN><TRNTYPE>DEBIT</TRNTYPE><DTPOSTED>20240410</DTPOSTED><TRNAMT>-12.30</TRNAMT><FITID>cc-1</FITID><MEMO>BAKERY &amp; CAFE</MEMO></STMTTRN>
</BANKTRANLIST>
</CCSTMTRS></CCSTMTTRNRS></CREDITCARDMSGSRSV1></OFX>"#;

        let txns = parse_ofx_text(text).unwrap();
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].kind, StatementKind::CreditCard);
        assert_eq!(txns[0].account_id.as_deref(), Some("4111"));
        assert_eq!(txns[0].description, "BAKERY & CAFE");
        assert_eq!(txns[0].amount, -12.30);
    }

    #[test]
    fn test_unclosed_final_stmttrn() {
        let text = "<OFX><STMTTRN><DTPOSTED>20240102<TRNAMT>-1.00<FITID>a";
        let txns = parse_ofx_text(text).unwrap();
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].description, "");
    }

    #[test]
    fn test_missing_fitid_is_error() {
        let text = "<OFX><STMTTRN><DTPOSTED>20240102<TRNAMT>-1.00</STMTTRN></OFX>";
        let err = parse_ofx_text(text).unwrap_err();
        assert!(err.to_string().contains("missing FITID"), "{err}");
    }

    #[test]
    fn test_not_ofx_is_error() {
        assert!(parse_ofx_text("Date,Description,Amount\n01/02/2024,X,1.00\n").is_err());
    }

    #[test]
    fn test_amount_and_date_helpers() {
        assert_eq!(parse_ofx_amount("+1,234.50").unwrap(), 1234.5);
        assert_eq!(parse_ofx_amount("-7,5").unwrap(), -7.5);
        assert_eq!(parse_ofx_amount("-1.234,56").unwrap(), -1234.56);
        assert_eq!(parse_ofx_amount("1,234.56").unwrap(), 1234.56);
        assert_eq!(parse_ofx_amount("10.000,50").unwrap(), 10000.5);
        assert!(parse_ofx_amount("abc").is_err());
        assert_eq!(
            parse_ofx_date("20231231235959.000[-5:EST]").unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
        assert!(parse_ofx_date("2023-12-31").is_err());
    }

    #[test]
    fn test_date_keeps_local_day_despite_offset() {
        assert_eq!(
            parse_ofx_date("20231231220000[-3:BRT]").unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
    }
}
