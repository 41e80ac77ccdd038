use crate::store::VersionTag;

const VERSION_PLACEHOLDER: &str = "{{default_version}}";

const INSTALL_SCRIPT_TEMPLATE: &str = r##"#!/bin/sh
# Keep this script extremely simple.

set -e

case $(uname -s) in
    Darwin)    os='darwin';;
    Linux)     os='linux';;
    *)         echo "Vessel is not built for this OS!" >&2; exit 1;;
esac

arch=$(uname -m)
version=${1:-{{default_version}}}

if [ "$arch" = "x86_64" ]; then
	arch="amd64"
fi

vessel_install="$HOME/.vessel"
bin_dir="$vessel_install/bin"
exe="$bin_dir/vessel"

if [ ! -d "$bin_dir" ]; then
	mkdir -p "$bin_dir"
fi

curl -q --fail --location --progress-bar --output "$exe.tar.gz" "https://github.com/Vessel-App/vessel-cli/releases/download/${version}/vessel-cli_${version}_${os}_${arch}.tar.gz"
cd "$bin_dir"
tar xzf "$exe.tar.gz"
chmod +x "$exe"
rm "$exe.tar.gz"

if [ "$os" = "darwin" ]; then
	echo "\n\033[0;32m\xE2\x9C\x94\033[0m vessel ${version} was installed successfully to $exe\n"
else
	echo -e "\n\033[0;32m\xE2\x9C\x94\033[0m vessel ${version} was installed successfully to $exe\n"
fi

cd $HOME
if command -v vessel >/dev/null; then
	echo "Run 'vessel --help' to get started\n"
else
	case $SHELL in
	/bin/zsh) shell_profile=".zshrc" ;;
	*) shell_profile=".bash_profile" ;;
	esac

	if [ "$os" = "darwin" ]; then
		echo "\033[0;33mNote:\033[0m Manually add the following to your \$HOME/$shell_profile (or similar)"
	else
		echo -e "\033[0;33mNote:\033[0m Manually add the following to your \$HOME/$shell_profile (or similar)"
	fi
	echo "  export PATH=\"${bin_dir}:\$PATH\"\n"
	echo "Run '$exe --help' to get started\n"
fi
"##;

/// Renders the install script with `version` as the default when no argument is passed.
pub fn render_install_script(version: &VersionTag) -> String {
    INSTALL_SCRIPT_TEMPLATE.replacen(VERSION_PLACEHOLDER, version.as_str(), 1)
}
