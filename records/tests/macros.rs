#[test]
fn derive_macros() {
    let t = trybuild::TestCases::new();
    t.pass("tests/macro/*.rs");
}
