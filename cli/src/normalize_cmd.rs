use clap::Parser;
use storyrag_retrieval::{NormalizeOptions, normalize};

#[derive(Debug, Parser)]
pub struct NormalizeArgs {
    /// Query to normalize
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Replace punctuation and symbols with spaces
    #[arg(long)]
    pub remove_special_chars: bool,

    /// Also replace hyphens when removing special characters
    #[arg(long)]
    pub drop_hyphens: bool,

    /// Keep underscores when removing special characters
    #[arg(long)]
    pub keep_underscores: bool,

    /// Delete digits
    #[arg(long)]
    pub strip_numbers: bool,

    /// Do not lowercase
    #[arg(long)]
    pub keep_case: bool,
}

impl NormalizeArgs {
    pub fn options(&self) -> NormalizeOptions {
        NormalizeOptions {
            lowercase: !self.keep_case,
            remove_special_chars: self.remove_special_chars,
            preserve_hyphens: !self.drop_hyphens,
            preserve_underscores: self.keep_underscores,
            preserve_numbers: !self.strip_numbers,
            ..Default::default()
        }
    }
}

pub(crate) fn run_normalize(args: NormalizeArgs) -> anyhow::Result<()> {
    let normalized = normalize(&args.query, &args.options());
    println!("{}", normalized.normalized);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flags_map_to_options() {
        let args = NormalizeArgs::parse_from([
            "normalize",
            "Query",
            "--remove-special-chars",
            "--strip-numbers",
            "--keep-case",
        ]);
        let options = args.options();
        assert!(options.remove_special_chars);
        assert!(!options.preserve_numbers);
        assert!(!options.lowercase);
        assert!(options.preserve_hyphens);
        assert!(options.trim_whitespace);
    }

    #[test]
    fn test_defaults_match_library_defaults() {
        let args = NormalizeArgs::parse_from(["normalize", "Query"]);
        assert_eq!(args.options(), NormalizeOptions::default());
    }
}
