// rexpp command-line entry point.
// Usage: rexpp [--color WHEN] [--dump-json] [-Dname=value] [-Ifolder] [+opt|-opt] [files...]

fn main() {
    rexpp::cli::run();
}
