//! Property tests for console command parsing.

use proptest::prelude::*;
use turnstile_server::console::Command;

const WORDS: [(&str, Command); 5] = [
    ("client_size", Command::ClientSize),
    ("accept_size", Command::AcceptSize),
    ("enable_trace", Command::EnableTrace),
    ("disable_trace", Command::DisableTrace),
    ("shutdown", Command::Shutdown),
];

proptest! {
    #[test]
    fn decoration_does_not_change_the_command(
        index in 0..WORDS.len(),
        tick in any::<bool>(),
        lead in "[ \t]{0,3}",
        trail in "[ \t]{0,3}",
    ) {
        let (word, expected) = WORDS[index];
        let line = format!("{lead}{}{word}{trail}", if tick { "`" } else { "" });
        prop_assert_eq!(Command::parse(&line), Some(expected));
    }

    #[test]
    fn unknown_words_ask_for_help(word in "[a-z_]{1,16}") {
        prop_assume!(WORDS.iter().all(|(known, _)| *known != word));
        prop_assert_eq!(Command::parse(&word), Some(Command::Help));
    }

    #[test]
    fn blank_lines_are_skipped(line in "[ \t]{0,8}`?[ \t]{0,8}") {
        prop_assert_eq!(Command::parse(&line), None);
    }
}
