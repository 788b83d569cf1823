//! Dockerfile templates, one per single-service variant

use super::node::{self, BUILD_COMMAND};
use std::path::Path;

/// Static site served by nginx on port 80
pub fn static_site(dir: &Path) -> String {
    let custom_config = if dir.join("nginx.conf").is_file() {
        "\n# Project-provided nginx configuration\nCOPY nginx.conf /etc/nginx/nginx.conf\n"
    } else {
        ""
    };

    format!(
        r#"FROM nginx:alpine

# Copy all files to nginx html directory
COPY . /usr/share/nginx/html
{custom_config}
EXPOSE 80

CMD ["nginx", "-g", "daemon off;"]
"#
    )
}

/// Node service that installs dependencies and runs its start command
pub fn node_service(dir: &Path, port: u16) -> String {
    let version = node::resolve_node_version(dir);
    let start = node::start_command(dir).exec_form();

    format!(
        r#"FROM node:{version}-alpine

WORKDIR /app

# Copy package files
COPY package*.json ./

# Install dependencies
RUN npm install

# Copy application files
COPY . .

ENV PORT={port}

# Expose the application port
EXPOSE {port}

# Start the application
CMD {start}
"#
    )
}

/// Next-like app: production build served by its own server on port 3000
pub fn server_rendered(dir: &Path) -> String {
    let version = node::resolve_node_version(dir);

    format!(
        r#"FROM node:{version}-alpine

WORKDIR /app

# Copy package files
COPY package*.json ./

# Install dependencies
RUN npm install

# Copy source files
COPY . .

# Build the application
RUN npm run build

EXPOSE 3000

# Start in production mode
CMD ["npm", "start"]
"#
    )
}

/// Component SPA: built with node, served by nginx with a history fallback
pub fn static_build(dir: &Path) -> String {
    let version = node::resolve_node_version(dir);

    format!(
        r#"# Build stage
FROM node:{version}-alpine AS build

WORKDIR /app

# Copy package files
COPY package*.json ./

# Install dependencies
RUN npm install

# Copy source files
COPY . .

# Build the application and collect its output directory
RUN {BUILD_COMMAND} && mkdir -p /out && \
    if [ -d dist ]; then cp -r dist/. /out/; \
    elif [ -d build ]; then cp -r build/. /out/; \
    elif [ -d out ]; then cp -r out/. /out/; \
    else echo "no build output (dist/, build/ or out/) found" && exit 1; fi

# Production stage
FROM nginx:alpine

COPY --from=build /out /usr/share/nginx/html

# Client-side routes fall back to the root document
RUN echo 'server {{ listen 80; location / {{ root /usr/share/nginx/html; index index.html; try_files $uri $uri/ /index.html; }} }}' > /etc/nginx/conf.d/default.conf

EXPOSE 80

CMD ["nginx", "-g", "daemon off;"]
"#
    )
}

/// Frontend half of a full-stack project, run with its dev/start server
pub fn frontend_service(dir: &Path, port: u16) -> String {
    let version = node::resolve_node_version(dir);

    format!(
        r#"FROM node:{version}-alpine

WORKDIR /app

COPY package*.json ./
RUN npm install

COPY . .

ENV PORT={port}

EXPOSE {port}

CMD ["npm", "start"]
"#
    )
}
