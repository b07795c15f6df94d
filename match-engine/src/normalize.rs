// Text normalizer for bank descriptions and customer names

/// Banking boilerplate stripped before similarity scoring. Closed set,
/// compared after uppercasing.
const NOISE_WORDS: [&str; 32] = [
    "PAYMENT",
    "DEPOSIT",
    "TRANSFER",
    "WITHDRAWAL",
    "CREDIT",
    "DEBIT",
    "CHK",
    "CHECK",
    "CHEQUE",
    "ACH",
    "WIRE",
    "EFT",
    "ONLINE",
    "ELECTRONIC",
    "EBANK",
    "INTERNET",
    "MOBILE",
    "PMT",
    "DEP",
    "TRF",
    "TXN",
    "REF",
    "POS",
    "FROM",
    "TO",
    "FOR",
    "THE",
    "AND",
    "PENDING",
    "CLEARED",
    "POSTED",
    "MEMO",
];

/// Canonicalize free-form text into an uppercase token stream joined by
/// single spaces: uppercase, map everything outside [A-Z0-9] to a space,
/// tokenize, drop noise words, rejoin.
///
/// Idempotent: `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(input: &str) -> String {
    let upper = input.to_uppercase();
    let stripped: String = upper
        .chars()
        .map(|c| {
            if c.is_ascii_uppercase() || c.is_ascii_digit() {
                c
            } else {
                ' '
            }
        })
        .collect();

    stripped
        .split_whitespace()
        .filter(|token| !NOISE_WORDS.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_noise_words() {
        assert_eq!(normalize("PAYMENT FROM ACME CORP"), "ACME CORP");
        assert_eq!(normalize("CHK DEP SMITH JOHN"), "SMITH JOHN");
        assert_eq!(normalize("ACH TRANSFER - GLOBEX, INC."), "GLOBEX INC");
    }

    #[test]
    fn test_uppercases_and_collapses_punctuation() {
        assert_eq!(normalize("acme-corp #1042"), "ACME CORP 1042");
        assert_eq!(normalize("  wayne   enterprises  "), "WAYNE ENTERPRISES");
    }

    #[test]
    fn test_noise_matching_is_whole_token() {
        // CHECKERS contains CHECK but is not a noise token
        assert_eq!(normalize("CHECKERS LLC"), "CHECKERS LLC");
    }

    #[test]
    fn test_empty_and_all_noise_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("payment pending memo"), "");
        assert_eq!(normalize("!!! --- ***"), "");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "PAYMENT FROM ACME CORP",
            "chk dep smith john",
            "Stark Industries, Ltd.",
            "",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once);
        }
    }
}
