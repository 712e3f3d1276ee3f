fn main() {
    mailmacro::cli::run();
}
