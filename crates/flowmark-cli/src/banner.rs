pub fn print_banner() {
    eprintln!(
        "\n  {} {}  {}\n",
        console::style("flowmark").cyan().bold(),
        console::style(format!("v{}", flowmark_core::VERSION)).dim(),
        console::style("handshake-complete plaintext TCP flow features").dim(),
    );
}
