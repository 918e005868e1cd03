fn main() {
    txbench::cmdline();
}
