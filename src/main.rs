fn main() {
    kdk::cli::run();
}
