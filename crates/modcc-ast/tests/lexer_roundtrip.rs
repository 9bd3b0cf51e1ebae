use modcc_ast::{Lexer, TokenKind};

#[test]
fn every_token_in_a_realistic_source_round_trips_its_spelling() {
    let source = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/hh.mod"))
        .expect("fixture readable");
    let mut lexer = Lexer::new(&source);
    loop {
        let tok = lexer.parse();
        if tok.kind == TokenKind::Eof {
            break;
        }
        assert_eq!(
            Lexer::relex_spelling(&tok.spelling),
            tok.kind,
            "token {:?} did not round-trip",
            tok
        );
    }
    assert!(lexer.last_error().is_none());
}

#[test]
fn peeking_never_advances_the_underlying_stream() {
    let mut lexer = Lexer::new("INITIAL { m = 0 }");
    for _ in 0..5 {
        assert_eq!(lexer.peek(), lexer.peek());
    }
    let first = lexer.parse();
    assert_eq!(first.kind, TokenKind::Initial);
}
