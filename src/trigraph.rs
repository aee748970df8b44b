//! Trigraph substitution (spec §4.1).
//!
//! Applies exactly the nine C90 trigraph mappings in a single left-to-right,
//! non-overlapping pass, prior to lexing. No escaping, no context sensitivity.

const TRIGRAPHS: &[(&str, char)] = &[
    ("??=", '#'),
    ("??/", '\\'),
    ("??'", '^'),
    ("??(", '['),
    ("??)", ']'),
    ("??!", '|'),
    ("??<", '{'),
    ("??>", '}'),
    ("??-", '~'),
];

pub fn substitute_trigraphs(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    'outer: while i < chars.len() {
        if chars[i] == '?' && i + 2 < chars.len() && chars[i + 1] == '?' {
            for (seq, replacement) in TRIGRAPHS {
                let seq_chars: Vec<char> = seq.chars().collect();
                if chars[i..].starts_with(&seq_chars[..]) {
                    out.push(*replacement);
                    i += 3;
                    continue 'outer;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_all_nine() {
        let input = "??=??/??'??(??)??!??<??>??-";
        assert_eq!(substitute_trigraphs(input), "#\\^[]|{}~");
    }

    #[test]
    fn leaves_non_trigraphs_alone() {
        assert_eq!(substitute_trigraphs("int x = 1 ? 2 : 3;"), "int x = 1 ? 2 : 3;");
    }

    #[test]
    fn non_overlapping_left_to_right() {
        // "??=?=" : first three chars form a trigraph ("??="), remainder is literal.
        assert_eq!(substitute_trigraphs("??=?="), "#?=");
    }
}
