//! `printf` formatting over VM words.
//!
//! Supported conversions are `d i u x X o c s p %`, with the `-` and `0`
//! flags, a field width and a precision. Length modifiers (`l`, `h`) are
//! accepted and ignored since every integer is one word.
use crate::{constants::Word, error::ResourceError, memory::Memory};

#[derive(Debug, Default)]
struct Spec {
    left: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
}

/// Format `fmt` with `args` into `out`, reading `%s` strings from `memory`.
///
/// Missing arguments read as 0. Returns the number of bytes written.
pub fn format(
    memory: &Memory,
    fmt: &[u8],
    args: &[Word],
    out: &mut Vec<u8>,
) -> Result<usize, ResourceError> {
    let start = out.len();
    let mut args = args.iter().copied();
    let mut bytes = fmt.iter().copied().peekable();

    while let Some(b) = bytes.next() {
        if b != b'%' {
            out.push(b);
            continue;
        }

        // Fields never grow past the size of VM memory.
        let limit = memory.len();
        let mut spec = Spec::default();
        while let Some(flag @ (b'-' | b'0')) = bytes.peek().copied() {
            match flag {
                b'-' => spec.left = true,
                _ => spec.zero = true,
            }
            bytes.next();
        }
        while let Some(d @ b'0'..=b'9') = bytes.peek().copied() {
            spec.width = (spec.width * 10 + (d - b'0') as usize).min(limit);
            bytes.next();
        }
        if bytes.peek() == Some(&b'.') {
            bytes.next();
            let mut precision = 0usize;
            while let Some(d @ b'0'..=b'9') = bytes.peek().copied() {
                precision = (precision * 10 + (d - b'0') as usize).min(limit);
                bytes.next();
            }
            spec.precision = Some(precision);
        }
        while let Some(b'l' | b'h') = bytes.peek().copied() {
            bytes.next();
        }

        let conversion = match bytes.next() {
            Some(c) => c,
            None => {
                out.push(b'%');
                break;
            }
        };

        match conversion {
            b'%' => out.push(b'%'),
            b'd' | b'i' => {
                let value = args.next().unwrap_or(0);
                let digits = value.unsigned_abs().to_string();
                number(out, &spec, value < 0, "", &digits);
            }
            b'u' => {
                let digits = (args.next().unwrap_or(0) as u64).to_string();
                number(out, &spec, false, "", &digits);
            }
            b'x' => {
                let digits = format!("{:x}", args.next().unwrap_or(0) as u64);
                number(out, &spec, false, "", &digits);
            }
            b'X' => {
                let digits = format!("{:X}", args.next().unwrap_or(0) as u64);
                number(out, &spec, false, "", &digits);
            }
            b'o' => {
                let digits = format!("{:o}", args.next().unwrap_or(0) as u64);
                number(out, &spec, false, "", &digits);
            }
            b'p' => {
                let digits = format!("{:x}", args.next().unwrap_or(0) as u64);
                number(out, &spec, false, "0x", &digits);
            }
            b'c' => {
                let c = args.next().unwrap_or(0) as u8;
                pad(out, &spec, &[c]);
            }
            b's' => {
                let addr = args.next().unwrap_or(0);
                let s = memory.c_str(addr)?;
                let s = match spec.precision {
                    Some(max) if max < s.len() => &s[..max],
                    _ => s,
                };
                pad(out, &spec, s);
            }
            other => {
                out.push(b'%');
                out.push(other);
            }
        }
    }

    Ok(out.len() - start)
}

/// Write `body` padded with spaces to the field width.
fn pad(out: &mut Vec<u8>, spec: &Spec, body: &[u8]) {
    let fill = spec.width.saturating_sub(body.len());
    if !spec.left {
        out.resize(out.len() + fill, b' ');
    }
    out.extend_from_slice(body);
    if spec.left {
        out.resize(out.len() + fill, b' ');
    }
}

/// Write an integer conversion.
///
/// Precision is the minimum number of digits. Zero padding goes between
/// the sign or prefix and the digits, and is ignored when left aligned
/// or when a precision is given, as in C.
fn number(out: &mut Vec<u8>, spec: &Spec, negative: bool, prefix: &str, digits: &str) {
    let digits = match spec.precision {
        Some(0) if digits == "0" => "",
        _ => digits,
    };
    let min_digits = spec.precision.unwrap_or(0).max(digits.len());

    let mut head = Vec::new();
    if negative {
        head.push(b'-');
    }
    head.extend_from_slice(prefix.as_bytes());

    let len = head.len() + min_digits;
    let zero_fill = spec.zero && !spec.left && spec.precision.is_none();
    let leading_zeros = if zero_fill {
        spec.width.saturating_sub(len)
    } else {
        0
    };

    let mut body = head;
    body.resize(body.len() + leading_zeros + min_digits - digits.len(), b'0');
    body.extend_from_slice(digits.as_bytes());
    pad(out, spec, &body);
}
