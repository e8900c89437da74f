fn main() {
    tiergraph::cli::run();
}
